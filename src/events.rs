use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::trace;

/// A named event delivered to listeners on an [`EventTarget`].
///
/// `detail` carries an arbitrary JSON payload (mirroring CustomEvent detail);
/// listeners that only care that the event happened can ignore it.
pub struct Event {
    name: String,
    detail: Value,
    default_prevented: Cell<bool>,
}

impl Event {
    pub fn new(name: impl Into<String>, detail: Value) -> Self {
        Self {
            name: name.into(),
            detail,
            default_prevented: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// Listener identity is `Rc` pointer identity: removal only affects the exact
/// reference that was registered, never a structurally-identical closure.
pub type EventListener = Rc<dyn Fn(&Event)>;

/// Insertion-ordered listener registry keyed by event name.
///
/// Registration is raw: repeated `add_listener` calls with the same reference
/// stack up. Callers that need at-most-once registration go through
/// [`ensure_listener`].
#[derive(Default)]
pub struct EventTarget {
    listeners: RefCell<HashMap<String, Vec<EventListener>>>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, name: &str, listener: &EventListener) {
        self.listeners
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(Rc::clone(listener));
    }

    /// Removes every registration of `listener` on `name`. No-op when the
    /// reference was never registered.
    pub fn remove_listener(&self, name: &str, listener: &EventListener) {
        if let Some(list) = self.listeners.borrow_mut().get_mut(name) {
            list.retain(|registered| !Rc::ptr_eq(registered, listener));
        }
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners
            .borrow()
            .get(name)
            .map_or(0, |list| list.len())
    }

    /// Dispatches `name` to every listener registered at the moment of the
    /// call, in insertion order. The list is snapshotted first, so listeners
    /// added or removed during dispatch only affect the next emit. Returns
    /// whether any listener called [`Event::prevent_default`].
    pub fn emit(&self, name: &str, detail: Value) -> bool {
        let snapshot: Vec<EventListener> = self
            .listeners
            .borrow()
            .get(name)
            .map(|list| list.to_vec())
            .unwrap_or_default();

        trace!(
            target: "navshim",
            event = name,
            listeners = snapshot.len(),
            "dispatching event"
        );

        let event = Event::new(name, detail);
        for listener in &snapshot {
            listener(&event);
        }
        event.default_prevented()
    }
}

/// Guarantees exactly one registration of `listener` on `(target, name)`
/// after the call, without disturbing other listeners on the pair.
///
/// Remove-then-add: removal of a never-registered reference is a no-op and is
/// identity-based, so repeated calls with the same reference are idempotent.
/// Reference-distinct closures are NOT deduplicated even when structurally
/// identical; callers must retain and reuse one reference.
pub fn ensure_listener(target: &EventTarget, name: &str, listener: &EventListener) {
    target.remove_listener(name, listener);
    target.add_listener(name, listener);
}

pub fn ensure_click(target: &EventTarget, listener: &EventListener) {
    ensure_listener(target, "click", listener);
}

pub fn ensure_keydown(target: &EventTarget, listener: &EventListener) {
    ensure_listener(target, "keydown", listener);
}

pub fn ensure_input(target: &EventTarget, listener: &EventListener) {
    ensure_listener(target, "input", listener);
}

/// Cancels every context-menu event on `target`. Intended to be called once
/// during startup.
pub fn suppress_context_menu(target: &EventTarget) {
    let listener: EventListener = Rc::new(|event: &Event| event.prevent_default());
    target.add_listener("contextmenu", &listener);
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use serde_json::json;

    fn counting_listener(hits: &Rc<Cell<u32>>) -> EventListener {
        let hits = Rc::clone(hits);
        Rc::new(move |_event: &Event| hits.set(hits.get() + 1))
    }

    #[test]
    fn ensure_listener_is_idempotent_per_reference() {
        let target = EventTarget::new();
        let hits = Rc::new(Cell::new(0));
        let listener = counting_listener(&hits);

        for _ in 0..5 {
            ensure_click(&target, &listener);
        }
        target.emit("click", Value::Null);

        assert_eq!(hits.get(), 1);
        assert_eq!(target.listener_count("click"), 1);
    }

    #[test]
    fn distinct_references_are_not_deduplicated() {
        let target = EventTarget::new();
        let hits = Rc::new(Cell::new(0));
        let first = counting_listener(&hits);
        let second = counting_listener(&hits);

        ensure_keydown(&target, &first);
        ensure_keydown(&target, &second);
        target.emit("keydown", Value::Null);

        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn ensure_listener_leaves_other_listeners_alone() {
        let target = EventTarget::new();
        let guarded_hits = Rc::new(Cell::new(0));
        let other_hits = Rc::new(Cell::new(0));
        let guarded = counting_listener(&guarded_hits);
        let other = counting_listener(&other_hits);

        target.add_listener("input", &other);
        ensure_input(&target, &guarded);
        ensure_input(&target, &guarded);
        target.emit("input", Value::Null);

        assert_eq!(other_hits.get(), 1);
        assert_eq!(guarded_hits.get(), 1);
    }

    #[test]
    fn remove_listener_without_registration_is_noop() {
        let target = EventTarget::new();
        let hits = Rc::new(Cell::new(0));
        let listener = counting_listener(&hits);

        target.remove_listener("click", &listener);
        assert_eq!(target.listener_count("click"), 0);
    }

    #[test]
    fn listeners_fire_in_insertion_order() {
        let target = EventTarget::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let order = Rc::clone(&order);
            let listener: EventListener =
                Rc::new(move |_event: &Event| order.borrow_mut().push(label));
            target.add_listener("click", &listener);
        }
        target.emit("click", Value::Null);

        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn emit_snapshots_before_dispatch() {
        let target = Rc::new(EventTarget::new());
        let late_hits = Rc::new(Cell::new(0));
        let late = counting_listener(&late_hits);

        let adder: EventListener = {
            let target = Rc::clone(&target);
            let late = Rc::clone(&late);
            Rc::new(move |_event: &Event| target.add_listener("click", &late))
        };
        target.add_listener("click", &adder);

        target.emit("click", Value::Null);
        assert_eq!(late_hits.get(), 0, "listener added mid-dispatch waits");

        target.emit("click", Value::Null);
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn detail_reaches_listeners() {
        let target = EventTarget::new();
        let seen = Rc::new(RefCell::new(Value::Null));
        let listener: EventListener = {
            let seen = Rc::clone(&seen);
            Rc::new(move |event: &Event| *seen.borrow_mut() = event.detail().clone())
        };
        target.add_listener("message", &listener);

        target.emit("message", json!({"kind": "greeting"}));
        assert_eq!(*seen.borrow(), json!({"kind": "greeting"}));
    }

    #[test]
    fn context_menu_suppression_prevents_default() {
        let target = EventTarget::new();
        suppress_context_menu(&target);
        assert!(target.emit("contextmenu", Value::Null));
        assert!(!target.emit("click", Value::Null));
    }
}
