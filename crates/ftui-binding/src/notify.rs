#![forbid(unsafe_code)]

//! Change-notification capabilities and the adapter bindings use to attach
//! to them.
//!
//! A data object can announce two kinds of change:
//!
//! - **property changed**: one of its members now reads differently
//!   ([`NotifyPropertyChanged`]);
//! - **collection changed**: its contents were added, removed, replaced,
//!   moved or cleared ([`NotifyCollectionChanged`]).
//!
//! The engine does not care which kind fired. [`subscribe`] attaches the same
//! [`ChangeHandler`] to every capability an object offers and
//! [`unsubscribe`] removes exactly those registrations again.
//!
//! [`HandlerList`] is the event slot object implementations embed: it stores
//! handlers in registration order and invokes a snapshot of them on
//! [`raise`](HandlerList::raise), so a handler may detach itself (or others)
//! while being notified.
//!
//! # Invariants
//!
//! 1. Handlers fire in registration order.
//! 2. `remove` detaches one registration of that exact handler; removing a
//!    handler that is not registered is a no-op.
//! 3. A handler removed during a raise still sees the raise in progress (it
//!    was in the snapshot) but none after it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::value::DataObject;

/// What changed on a notifying object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeNotice {
    /// A member changed; carries the member name (`Item[]` for indexers).
    Property(Rc<str>),
    /// Collection contents changed.
    Collection(CollectionAction),
}

/// Kind of collection mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionAction {
    Add { index: usize },
    Remove { index: usize },
    Replace { index: usize },
    Move { from: usize, to: usize },
    Reset,
}

/// Shared change callback. Equality is handler identity.
#[derive(Clone)]
pub struct ChangeHandler {
    callback: Rc<dyn Fn(&ChangeNotice)>,
}

impl ChangeHandler {
    pub fn new(callback: impl Fn(&ChangeNotice) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub fn invoke(&self, notice: &ChangeNotice) {
        (self.callback)(notice);
    }

    /// Whether `self` and `other` are the same registration target.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.callback), Rc::as_ptr(&other.callback))
    }
}

impl fmt::Debug for ChangeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHandler")
            .field("ptr", &Rc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

/// An event slot holding change handlers.
#[derive(Default)]
pub struct HandlerList {
    handlers: RefCell<Vec<ChangeHandler>>,
}

impl HandlerList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: &ChangeHandler) {
        self.handlers.borrow_mut().push(handler.clone());
    }

    /// Remove the most recent registration of `handler`. Returns whether one
    /// was found.
    pub fn remove(&self, handler: &ChangeHandler) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        match handlers.iter().rposition(|h| h.same(handler)) {
            Some(pos) => {
                handlers.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Invoke every registered handler with `notice`.
    pub fn raise(&self, notice: &ChangeNotice) {
        let snapshot = self.handlers.borrow().clone();
        for handler in &snapshot {
            handler.invoke(notice);
        }
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }
}

impl fmt::Debug for HandlerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerList")
            .field("len", &self.len())
            .finish()
    }
}

/// Objects that announce member changes.
pub trait NotifyPropertyChanged {
    fn add_property_handler(&self, handler: &ChangeHandler);
    fn remove_property_handler(&self, handler: &ChangeHandler);
}

/// Objects that announce collection mutations.
pub trait NotifyCollectionChanged {
    fn add_collection_handler(&self, handler: &ChangeHandler);
    fn remove_collection_handler(&self, handler: &ChangeHandler);
}

/// Which change notifications an object offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyCapability {
    None,
    Property,
    Collection,
    Both,
}

impl NotifyCapability {
    /// Query an object's capabilities. `None` has no capabilities.
    #[must_use]
    pub fn of(object: Option<&dyn DataObject>) -> Self {
        let Some(object) = object else {
            return Self::None;
        };
        match (
            object.property_notifier().is_some(),
            object.collection_notifier().is_some(),
        ) {
            (true, true) => Self::Both,
            (true, false) => Self::Property,
            (false, true) => Self::Collection,
            (false, false) => Self::None,
        }
    }

    #[must_use]
    pub fn supports_property_change(self) -> bool {
        matches!(self, Self::Property | Self::Both)
    }

    #[must_use]
    pub fn supports_collection_change(self) -> bool {
        matches!(self, Self::Collection | Self::Both)
    }
}

/// Attach `handler` to every notification capability of `object`.
///
/// Returns whether at least one registration was made.
pub fn subscribe(object: Option<&dyn DataObject>, handler: &ChangeHandler) -> bool {
    let Some(object) = object else {
        return false;
    };
    let mut attached = false;
    if let Some(notifier) = object.property_notifier() {
        notifier.add_property_handler(handler);
        attached = true;
    }
    if let Some(notifier) = object.collection_notifier() {
        notifier.add_collection_handler(handler);
        attached = true;
    }
    attached
}

/// Detach what [`subscribe`] attached. Idempotent.
pub fn unsubscribe(object: Option<&dyn DataObject>, handler: &ChangeHandler) {
    let Some(object) = object else {
        return;
    };
    if let Some(notifier) = object.property_notifier() {
        notifier.remove_property_handler(handler);
    }
    if let Some(notifier) = object.collection_notifier() {
        notifier.remove_collection_handler(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Both {
        props: HandlerList,
        items: HandlerList,
    }

    impl DataObject for Both {
        fn type_name(&self) -> &str {
            "Both"
        }

        fn property_notifier(&self) -> Option<&dyn NotifyPropertyChanged> {
            Some(self)
        }

        fn collection_notifier(&self) -> Option<&dyn NotifyCollectionChanged> {
            Some(self)
        }
    }

    impl NotifyPropertyChanged for Both {
        fn add_property_handler(&self, handler: &ChangeHandler) {
            self.props.add(handler);
        }

        fn remove_property_handler(&self, handler: &ChangeHandler) {
            self.props.remove(handler);
        }
    }

    impl NotifyCollectionChanged for Both {
        fn add_collection_handler(&self, handler: &ChangeHandler) {
            self.items.add(handler);
        }

        fn remove_collection_handler(&self, handler: &ChangeHandler) {
            self.items.remove(handler);
        }
    }

    struct Silent;

    impl DataObject for Silent {
        fn type_name(&self) -> &str {
            "Silent"
        }
    }

    fn counter() -> (ChangeHandler, Rc<Cell<u32>>) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (ChangeHandler::new(move |_| h.set(h.get() + 1)), hits)
    }

    #[test]
    fn handler_list_fires_in_order() {
        let list = HandlerList::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let l = Rc::clone(&log);
            list.add(&ChangeHandler::new(move |_| l.borrow_mut().push(i)));
        }
        list.raise(&ChangeNotice::Property("X".into()));
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn remove_is_identity_based_and_idempotent() {
        let list = HandlerList::new();
        let (a, _) = counter();
        let (b, _) = counter();
        list.add(&a);
        list.add(&b);
        assert!(list.remove(&a));
        assert!(!list.remove(&a));
        assert_eq!(list.len(), 1);
        assert!(list.remove(&b.clone()));
        assert!(list.is_empty());
    }

    #[test]
    fn handler_may_detach_during_raise() {
        let list = Rc::new(HandlerList::new());
        let slot: Rc<RefCell<Option<ChangeHandler>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let (l, s, h) = (Rc::clone(&list), Rc::clone(&slot), Rc::clone(&hits));
        let handler = ChangeHandler::new(move |_| {
            h.set(h.get() + 1);
            if let Some(me) = s.borrow().as_ref() {
                l.remove(me);
            }
        });
        *slot.borrow_mut() = Some(handler.clone());
        list.add(&handler);

        list.raise(&ChangeNotice::Collection(CollectionAction::Reset));
        list.raise(&ChangeNotice::Collection(CollectionAction::Reset));
        assert_eq!(hits.get(), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn capability_tags() {
        assert_eq!(NotifyCapability::of(None), NotifyCapability::None);
        assert_eq!(NotifyCapability::of(Some(&Silent)), NotifyCapability::None);
        let both = Both::default();
        let cap = NotifyCapability::of(Some(&both));
        assert_eq!(cap, NotifyCapability::Both);
        assert!(cap.supports_property_change());
        assert!(cap.supports_collection_change());
        assert!(!NotifyCapability::Property.supports_collection_change());
    }

    #[test]
    fn subscribe_attaches_every_capability() {
        let both = Both::default();
        let (handler, hits) = counter();
        assert!(subscribe(Some(&both), &handler));
        assert_eq!(both.props.len(), 1);
        assert_eq!(both.items.len(), 1);

        both.props.raise(&ChangeNotice::Property("Count".into()));
        both.items
            .raise(&ChangeNotice::Collection(CollectionAction::Add { index: 0 }));
        assert_eq!(hits.get(), 2);

        unsubscribe(Some(&both), &handler);
        unsubscribe(Some(&both), &handler);
        assert!(both.props.is_empty());
        assert!(both.items.is_empty());
    }

    #[test]
    fn subscribe_to_nothing() {
        let (handler, _) = counter();
        assert!(!subscribe(None, &handler));
        assert!(!subscribe(Some(&Silent), &handler));
        unsubscribe(None, &handler);
        unsubscribe(Some(&Silent), &handler);
    }

    #[test]
    fn unsubscribe_leaves_other_handlers() {
        let both = Both::default();
        let (a, a_hits) = counter();
        let (b, b_hits) = counter();
        subscribe(Some(&both), &a);
        subscribe(Some(&both), &b);
        unsubscribe(Some(&both), &a);
        both.props.raise(&ChangeNotice::Property("X".into()));
        assert_eq!(a_hits.get(), 0);
        assert_eq!(b_hits.get(), 1);
    }
}
