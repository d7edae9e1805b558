use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::trace;
use url::Url;

use crate::events::EventTarget;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("could not resolve navigation target: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// One observed navigation: where the window now points, and the opaque state
/// payload attached to the current history entry (absent when the entry
/// carries no state).
#[derive(Debug, Clone, Serialize)]
pub struct NavigationSignal {
    pub url: Url,
    pub state: Option<Value>,
}

/// Subscriber identity is `Rc` pointer identity, matching [`EventListener`]
/// semantics.
///
/// [`EventListener`]: crate::events::EventListener
pub type NavigationCallback = Rc<dyn Fn(&NavigationSignal)>;

/// The host's first-class navigation-observation facility, when it has one.
///
/// Keeps an insertion-ordered callback list and fires it after every
/// completed navigation. Deliberately does NOT deduplicate repeated adds of
/// the same reference; [`NavigationObserver`] layers that guarantee on top.
///
/// [`NavigationObserver`]: crate::observer::NavigationObserver
pub struct NativeNavigation {
    callbacks: RefCell<Vec<NavigationCallback>>,
}

impl NativeNavigation {
    fn new() -> Self {
        Self {
            callbacks: RefCell::new(Vec::new()),
        }
    }

    pub fn add_callback(&self, callback: &NavigationCallback) {
        self.callbacks.borrow_mut().push(Rc::clone(callback));
    }

    pub fn remove_callback(&self, callback: &NavigationCallback) {
        self.callbacks
            .borrow_mut()
            .retain(|registered| !Rc::ptr_eq(registered, callback));
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.borrow().len()
    }

    pub(crate) fn notify(&self, signal: &NavigationSignal) {
        let snapshot = self.callbacks.borrow().clone();
        for callback in &snapshot {
            callback(signal);
        }
    }
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    url: Url,
    state: Value,
}

struct History {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl History {
    fn new(initial_url: Url) -> Self {
        Self {
            entries: vec![HistoryEntry {
                url: initial_url,
                state: Value::Null,
            }],
            index: 0,
        }
    }

    fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }

    fn push_entry(&mut self, url: Url, state: Value) {
        // A push discards any forward entries, like the browser history list
        self.entries.truncate(self.index + 1);
        self.entries.push(HistoryEntry { url, state });
        self.index += 1;
    }

    fn replace_entry(&mut self, url: Url, state: Value) {
        self.entries[self.index] = HistoryEntry { url, state };
    }

    fn go(&mut self, delta: isize) -> bool {
        let target = self.index as isize + delta;
        if target < 0 || target as usize >= self.entries.len() {
            return false;
        }
        self.index = target as usize;
        true
    }
}

/// The slot a programmatic history mutation is routed through. Decoration
/// (see [`crate::history::install`]) swaps the slot for a wrapper that calls
/// through to the value captured at install time.
pub type HistoryMutator = Rc<dyn Fn(&Window, Value, &str, &str) -> Result<(), HostError>>;

pub(crate) struct MutatorSlots {
    pub(crate) push: HistoryMutator,
    pub(crate) replace: HistoryMutator,
    /// One-shot marker: set when the slots have been decorated, checked on
    /// every later install attempt.
    pub(crate) patched: bool,
}

/// The explicit host model: event target, history list, title slot, the
/// mutator slot table, and (optionally) a native navigation facility.
///
/// One `Window` is constructed by the application's startup sequence and
/// shared by `Rc` handle; all interior state is single-threaded
/// (`RefCell`-guarded) and no borrow is held across listener dispatch.
pub struct Window {
    events: EventTarget,
    history: RefCell<History>,
    title: RefCell<String>,
    slots: RefCell<MutatorSlots>,
    navigation: Option<Rc<NativeNavigation>>,
}

impl Window {
    /// Host without a native navigation facility; observers fall back to the
    /// history primitives.
    pub fn new(initial_url: &str) -> Result<Rc<Self>, HostError> {
        Self::build(initial_url, false)
    }

    /// Host exposing the first-class navigation facility.
    pub fn with_navigation_api(initial_url: &str) -> Result<Rc<Self>, HostError> {
        Self::build(initial_url, true)
    }

    fn build(initial_url: &str, native: bool) -> Result<Rc<Self>, HostError> {
        let initial_url = Url::parse(initial_url)?;
        Ok(Rc::new(Self {
            events: EventTarget::new(),
            history: RefCell::new(History::new(initial_url)),
            title: RefCell::new(String::new()),
            slots: RefCell::new(MutatorSlots {
                push: Rc::new(Self::raw_push),
                replace: Rc::new(Self::raw_replace),
                patched: false,
            }),
            navigation: native.then(|| Rc::new(NativeNavigation::new())),
        }))
    }

    pub fn events(&self) -> &EventTarget {
        &self.events
    }

    pub fn navigation(&self) -> Option<&Rc<NativeNavigation>> {
        self.navigation.as_ref()
    }

    pub fn location(&self) -> Url {
        self.history.borrow().current().url.clone()
    }

    /// State payload of the current history entry (`Null` when none was set).
    pub fn state(&self) -> Value {
        self.history.borrow().current().state.clone()
    }

    pub fn title(&self) -> String {
        self.title.borrow().clone()
    }

    pub fn set_title(&self, title: &str) {
        *self.title.borrow_mut() = title.to_string();
    }

    pub fn history_len(&self) -> usize {
        self.history.borrow().entries.len()
    }

    pub fn history_index(&self) -> usize {
        self.history.borrow().index
    }

    pub(crate) fn slots(&self) -> Ref<'_, MutatorSlots> {
        self.slots.borrow()
    }

    pub(crate) fn slots_mut(&self) -> RefMut<'_, MutatorSlots> {
        self.slots.borrow_mut()
    }

    /// Programmatic push, routed through the currently-installed mutator
    /// slot. `url` may be relative (resolved against the current location)
    /// or empty (current location kept).
    pub fn push_state(&self, state: Value, title: &str, url: &str) -> Result<(), HostError> {
        let mutator = Rc::clone(&self.slots.borrow().push);
        mutator(self, state, title, url)
    }

    /// Programmatic replace, routed through the currently-installed mutator
    /// slot.
    pub fn replace_state(&self, state: Value, title: &str, url: &str) -> Result<(), HostError> {
        let mutator = Rc::clone(&self.slots.borrow().replace);
        mutator(self, state, title, url)
    }

    /// Traverses one entry back; fires `"popstate"` when the cursor moved,
    /// nothing otherwise.
    pub fn back(&self) -> bool {
        self.traverse(-1)
    }

    pub fn forward(&self) -> bool {
        self.traverse(1)
    }

    /// Same-document fragment change: pushes an entry for the new fragment
    /// and fires `"hashchange"`. A no-op when the fragment is unchanged.
    pub fn set_fragment(&self, fragment: &str) {
        let old = self.location();
        let mut url = old.clone();
        url.set_fragment(Some(fragment));
        if url == old {
            return;
        }
        self.history.borrow_mut().push_entry(url.clone(), Value::Null);
        trace!(target: "navshim", from = %old, to = %url, "fragment change");
        self.events.emit(
            "hashchange",
            json!({ "oldURL": old.as_str(), "newURL": url.as_str() }),
        );
        self.notify_native();
    }

    /// Snapshot of the current location and history state, in the shape the
    /// fan-out delivers to subscribers.
    pub fn current_signal(&self) -> NavigationSignal {
        let state = self.state();
        NavigationSignal {
            url: self.location(),
            state: (!state.is_null()).then_some(state),
        }
    }

    // The undecorated primitives: mutate the history list and tell the
    // native facility, nothing else. Browsers ignore the title argument
    // here; only the decorated slots assign it.
    fn raw_push(window: &Window, state: Value, _title: &str, url: &str) -> Result<(), HostError> {
        let resolved = window.resolve(url)?;
        window.history.borrow_mut().push_entry(resolved, state);
        window.notify_native();
        Ok(())
    }

    fn raw_replace(window: &Window, state: Value, _title: &str, url: &str) -> Result<(), HostError> {
        let resolved = window.resolve(url)?;
        window.history.borrow_mut().replace_entry(resolved, state);
        window.notify_native();
        Ok(())
    }

    fn traverse(&self, delta: isize) -> bool {
        let moved = self.history.borrow_mut().go(delta);
        if moved {
            let state = self.state();
            self.events.emit("popstate", json!({ "state": state }));
            self.notify_native();
        }
        moved
    }

    fn notify_native(&self) {
        if let Some(facility) = &self.navigation {
            facility.notify(&self.current_signal());
        }
    }

    fn resolve(&self, url: &str) -> Result<Url, HostError> {
        if url.is_empty() {
            return Ok(self.location());
        }
        Ok(self.location().join(url)?)
    }
}
