// Library exports for embedders and tests

pub mod events;
pub mod history;
pub mod host;
pub mod observer;

// Re-export the types most embedders touch
pub use events::{
    ensure_click, ensure_input, ensure_keydown, ensure_listener, suppress_context_menu, Event,
    EventListener, EventTarget,
};
pub use history::FALLBACK_NAVIGATE;
pub use host::{HostError, NativeNavigation, NavigationCallback, NavigationSignal, Window};
pub use observer::NavigationObserver;
