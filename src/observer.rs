use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::events::{ensure_listener, EventListener};
use crate::history;
use crate::host::{NativeNavigation, NavigationCallback, NavigationSignal, Window};

/// The unified navigation-observation façade.
///
/// One observer is attached per window by the application's startup sequence
/// and handed around by reference; `subscribe` registers a callback to fire
/// exactly once per logically-distinct navigation (programmatic push or
/// replace, back/forward traversal, fragment change), deduplicated by `Rc`
/// identity.
///
/// Fan-out snapshot-iterates the subscriber set: subscribing or
/// unsubscribing from inside a callback affects the next signal only, so a
/// callback removed mid-dispatch can still receive the in-flight signal.
pub struct NavigationObserver {
    backend: Backend,
}

enum Backend {
    /// The host has a first-class facility; delegate, with remove-then-add
    /// dedup layered on top since the facility itself allows duplicates.
    Native { facility: Rc<NativeNavigation> },
    /// No facility: history decoration plus the raw browser signals, wired
    /// lazily on first subscribe.
    Fallback {
        window: Rc<Window>,
        core: RefCell<Option<Rc<FallbackCore>>>,
    },
}

impl NavigationObserver {
    /// Capability detection happens once, here: the returned observer is
    /// permanently on the native or the fallback path.
    pub fn attach(window: &Rc<Window>) -> Self {
        let backend = match window.navigation() {
            Some(facility) => {
                debug!(target: "navshim", "native navigation facility detected");
                Backend::Native {
                    facility: Rc::clone(facility),
                }
            }
            None => {
                debug!(target: "navshim", "no native navigation facility, using history fallback");
                Backend::Fallback {
                    window: Rc::clone(window),
                    core: RefCell::new(None),
                }
            }
        };
        Self { backend }
    }

    /// Registers `callback` for the unified navigation event. Set semantics
    /// by reference: re-subscribing the same `Rc` moves it to the end of the
    /// delivery order instead of duplicating it.
    pub fn subscribe(&self, callback: &NavigationCallback) {
        match &self.backend {
            Backend::Native { facility } => {
                facility.remove_callback(callback);
                facility.add_callback(callback);
            }
            Backend::Fallback { window, core } => {
                let core = ensure_core(window, core);
                core.subscribe(callback);
            }
        }
        trace!(target: "navshim", subscribers = self.subscriber_count(), "subscribed");
    }

    /// Removes a previously-registered callback; no-op if absent.
    pub fn unsubscribe(&self, callback: &NavigationCallback) {
        match &self.backend {
            Backend::Native { facility } => facility.remove_callback(callback),
            Backend::Fallback { core, .. } => {
                if let Some(core) = core.borrow().as_ref() {
                    core.unsubscribe(callback);
                }
            }
        }
        trace!(target: "navshim", subscribers = self.subscriber_count(), "unsubscribed");
    }

    pub fn subscriber_count(&self) -> usize {
        match &self.backend {
            Backend::Native { facility } => facility.callback_count(),
            Backend::Fallback { core, .. } => {
                core.borrow().as_ref().map_or(0, |core| core.len())
            }
        }
    }
}

/// Shared state of the fallback path: the subscriber set the three raw
/// signals fan out to.
struct FallbackCore {
    callbacks: RefCell<Vec<NavigationCallback>>,
}

impl FallbackCore {
    fn subscribe(&self, callback: &NavigationCallback) {
        let mut callbacks = self.callbacks.borrow_mut();
        callbacks.retain(|registered| !Rc::ptr_eq(registered, callback));
        callbacks.push(Rc::clone(callback));
    }

    fn unsubscribe(&self, callback: &NavigationCallback) {
        self.callbacks
            .borrow_mut()
            .retain(|registered| !Rc::ptr_eq(registered, callback));
    }

    fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }

    fn dispatch(&self, signal: &NavigationSignal) {
        let snapshot = self.callbacks.borrow().clone();
        trace!(
            target: "navshim",
            url = %signal.url,
            subscribers = snapshot.len(),
            "fanning out navigation signal"
        );
        for callback in &snapshot {
            callback(signal);
        }
    }
}

/// Builds the fallback singleton on first use: decorate the history mutators,
/// then attach ONE shared listener to the three raw signal sources. Each
/// attachment goes through `ensure_listener`, so a re-entrant construction
/// attempt can never double-register.
fn ensure_core(window: &Rc<Window>, slot: &RefCell<Option<Rc<FallbackCore>>>) -> Rc<FallbackCore> {
    if let Some(core) = slot.borrow().as_ref() {
        return Rc::clone(core);
    }

    history::install(window);

    let core = Rc::new(FallbackCore {
        callbacks: RefCell::new(Vec::new()),
    });
    let listener: EventListener = {
        let window = Rc::clone(window);
        let core = Rc::clone(&core);
        // The raw events carry partial details; the unified signal is always
        // synthesized from the window's current location and state.
        Rc::new(move |_event| core.dispatch(&window.current_signal()))
    };
    for name in ["popstate", "hashchange", history::FALLBACK_NAVIGATE] {
        ensure_listener(window.events(), name, &listener);
    }

    *slot.borrow_mut() = Some(Rc::clone(&core));
    core
}
