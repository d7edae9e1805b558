//! Drives the shim against a headless window: subscribe a content gate,
//! load the initial page, then walk through the four navigation kinds.
//!
//! `shim_demo [--no-native]` — the flag hides the native facility so the
//! history-fallback path is exercised instead.

use std::rc::Rc;

use anyhow::Result;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use navshim::{NavigationCallback, NavigationObserver, Window};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_target(false)
        .init();

    let force_fallback = std::env::args().any(|arg| arg == "--no-native");
    let window = if force_fallback {
        Window::new("https://example.com/")?
    } else {
        Window::with_navigation_api("https://example.com/")?
    };

    let observer = NavigationObserver::attach(&window);

    // The content gate: in the real application this re-renders the page
    // body for the new location.
    let content_gate: NavigationCallback = Rc::new(|signal| {
        info!(url = %signal.url, state = ?signal.state, "content gate invoked");
    });
    observer.subscribe(&content_gate);

    // The observer never fires for the page that is already loaded; the
    // startup sequence invokes the gate once itself.
    content_gate(&window.current_signal());

    window.push_state(json!({"page": "gallery"}), "Gallery", "/gallery")?;
    window.replace_state(json!({"page": "gallery", "tab": 2}), "Gallery (tab 2)", "")?;
    window.set_fragment("item-14");
    window.back();

    info!(title = %window.title(), location = %window.location(), "final window state");
    Ok(())
}
