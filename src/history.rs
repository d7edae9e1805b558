use std::rc::Rc;

use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::host::{HistoryMutator, Window};

/// Synthetic event emitted after every decorated push/replace, carrying
/// `{url, state}` in its detail.
pub const FALLBACK_NAVIGATE: &str = "fallbacknavigate";

/// Decorates the window's push/replace mutator slots exactly once per window
/// lifetime.
///
/// Each wrapper keeps a reference to the slot value captured at install time
/// and, after calling through to it, assigns the title argument to the
/// window's title slot and emits [`FALLBACK_NAVIGATE`]. Repeat calls are
/// no-ops: the marker lives on the slot table itself, so the check holds no
/// matter which call site attempts the install. Without that single-shot
/// guarantee the wrappers would compose and one mutation would broadcast
/// more than one synthetic event.
pub fn install(window: &Rc<Window>) {
    {
        let slots = window.slots();
        if slots.patched {
            trace!(target: "navshim", "history mutators already decorated, skipping");
            return;
        }
    }

    let mut slots = window.slots_mut();
    slots.push = decorate(Rc::clone(&slots.push));
    slots.replace = decorate(Rc::clone(&slots.replace));
    slots.patched = true;
    debug!(target: "navshim", "history mutators decorated with synthetic navigation events");
}

fn decorate(original: HistoryMutator) -> HistoryMutator {
    Rc::new(
        move |window: &Window, state: Value, title: &str, url: &str| {
            original(window, state.clone(), title, url)?;
            window.set_title(title);
            window.events().emit(
                FALLBACK_NAVIGATE,
                json!({ "url": window.location().as_str(), "state": state }),
            );
            Ok(())
        },
    )
}
