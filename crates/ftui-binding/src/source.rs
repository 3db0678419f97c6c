#![forbid(unsafe_code)]

//! Producers of binding roots.
//!
//! A binding evaluates against a root (the "data context"). The root may be
//! fixed for the binding's whole life ([`SingleRoot`]) or replaced over time
//! ([`RootSubject`]). Either way the source only holds the root weakly: the
//! element tree owns the data context, not the binding.
//!
//! Emitting `None` (or a root that has since been dropped) means "no live
//! root"; the engine stops evaluating until a new root arrives.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::value::{ObjectRef, WeakObject};

/// Receiver of root emissions.
pub type RootSink = Rc<dyn Fn(Option<ObjectRef>)>;

/// Something that emits binding roots.
pub trait RootSource {
    /// Start delivering roots to `sink`. Delivery stops when the returned
    /// guard is dropped.
    fn subscribe(&self, sink: RootSink) -> RootSubscription;
}

/// RAII guard for a root-source subscription.
#[must_use = "dropping a RootSubscription stops root delivery"]
pub struct RootSubscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl RootSubscription {
    /// Subscription whose drop runs `cancel`.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription with nothing to release.
    pub fn empty() -> Self {
        Self { cancel: None }
    }
}

impl Drop for RootSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for RootSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SingleRoot
// ---------------------------------------------------------------------------

/// A root that never changes. Emits it once, immediately, to each
/// subscriber while it is still alive.
pub struct SingleRoot {
    root: WeakObject,
}

impl SingleRoot {
    #[must_use]
    pub fn new(root: &ObjectRef) -> Self {
        Self {
            root: Rc::downgrade(root),
        }
    }
}

impl RootSource for SingleRoot {
    fn subscribe(&self, sink: RootSink) -> RootSubscription {
        if let Some(root) = self.root.upgrade() {
            sink(Some(root));
        }
        RootSubscription::empty()
    }
}

impl fmt::Debug for SingleRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleRoot")
            .field("alive", &(self.root.strong_count() > 0))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RootSubject
// ---------------------------------------------------------------------------

struct SubjectInner {
    latest: RefCell<Option<WeakObject>>,
    sinks: RefCell<Vec<(u64, RootSink)>>,
    next_id: Cell<u64>,
}

/// Externally driven root stream.
///
/// [`push`](Self::push) delivers a root to every current subscriber. The
/// latest root is remembered weakly and replayed to new subscribers while
/// it is alive.
#[derive(Clone)]
pub struct RootSubject {
    inner: Rc<SubjectInner>,
}

impl RootSubject {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SubjectInner {
                latest: RefCell::new(None),
                sinks: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Subject whose first root is `root`.
    #[must_use]
    pub fn with_root(root: &ObjectRef) -> Self {
        let subject = Self::new();
        *subject.inner.latest.borrow_mut() = Some(Rc::downgrade(root));
        subject
    }

    /// Emit a new root (or `None` to clear it).
    pub fn push(&self, root: Option<&ObjectRef>) {
        *self.inner.latest.borrow_mut() = root.map(Rc::downgrade);
        let sinks: Vec<RootSink> = self
            .inner
            .sinks
            .borrow()
            .iter()
            .map(|(_, sink)| Rc::clone(sink))
            .collect();
        for sink in sinks {
            sink(root.cloned());
        }
    }

    /// The latest root, if it is still alive.
    #[must_use]
    pub fn latest(&self) -> Option<ObjectRef> {
        self.inner.latest.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Number of attached sinks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.sinks.borrow().len()
    }
}

impl Default for RootSubject {
    fn default() -> Self {
        Self::new()
    }
}

impl RootSource for RootSubject {
    fn subscribe(&self, sink: RootSink) -> RootSubscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.sinks.borrow_mut().push((id, Rc::clone(&sink)));

        if let Some(root) = self.latest() {
            sink(Some(root));
        }

        let weak = Rc::downgrade(&self.inner);
        RootSubscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.sinks.borrow_mut().retain(|(sid, _)| *sid != id);
            }
        })
    }
}

impl fmt::Debug for RootSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSubject")
            .field("subscribers", &self.subscriber_count())
            .field("has_root", &self.latest().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Record;

    fn collector() -> (RootSink, Rc<RefCell<Vec<Option<String>>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sink: RootSink = Rc::new(move |root: Option<ObjectRef>| {
            l.borrow_mut()
                .push(root.map(|r| r.type_name().to_owned()));
        });
        (sink, log)
    }

    #[test]
    fn single_root_emits_once_per_subscriber() {
        let root: ObjectRef = Rc::new(Record::new("Root"));
        let source = SingleRoot::new(&root);
        let (sink, log) = collector();
        let _a = source.subscribe(Rc::clone(&sink));
        let _b = source.subscribe(sink);
        assert_eq!(*log.borrow(), vec![Some("Root".into()), Some("Root".into())]);
    }

    #[test]
    fn single_root_holds_root_weakly() {
        let root: ObjectRef = Rc::new(Record::new("Root"));
        let source = SingleRoot::new(&root);
        drop(root);
        let (sink, log) = collector();
        let _sub = source.subscribe(sink);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn subject_pushes_and_replays() {
        let subject = RootSubject::new();
        let (sink, log) = collector();
        let sub = subject.subscribe(sink);
        assert!(log.borrow().is_empty());

        let a: ObjectRef = Rc::new(Record::new("A"));
        subject.push(Some(&a));
        subject.push(None);
        let b: ObjectRef = Rc::new(Record::new("B"));
        subject.push(Some(&b));
        assert_eq!(
            *log.borrow(),
            vec![Some("A".into()), None, Some("B".into())]
        );

        let (late, late_log) = collector();
        let _late = subject.subscribe(late);
        assert_eq!(*late_log.borrow(), vec![Some("B".into())]);

        drop(sub);
        assert_eq!(subject.subscriber_count(), 1);
    }

    #[test]
    fn subject_does_not_keep_root_alive() {
        let root: ObjectRef = Rc::new(Record::new("Root"));
        let subject = RootSubject::with_root(&root);
        assert!(subject.latest().is_some());
        drop(root);
        assert!(subject.latest().is_none());

        let (sink, log) = collector();
        let _sub = subject.subscribe(sink);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn subscription_outliving_subject_is_harmless() {
        let subject = RootSubject::new();
        let (sink, _) = collector();
        let sub = subject.subscribe(sink);
        drop(subject);
        drop(sub);
    }
}
