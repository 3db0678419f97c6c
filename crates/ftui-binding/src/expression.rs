#![forbid(unsafe_code)]

//! Live binding expressions.
//!
//! A [`BindingExpression<T>`] watches an access path such as
//! `DataContext.Customer.Orders[0].Total` and publishes a [`BindingValue<T>`]
//! to its observers whenever anything along the path changes: the root, any
//! intermediate object, or the final member.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──first subscribe──▶ listening to root
//!        ▲                                │ root emitted
//!        │                                ▼
//!        └──last unsubscribe──── chain subscribed ◀─┐
//!                                         │ notice  │
//!                                         └─────────┘ rebuild from link, republish
//! ```
//!
//! The engine keeps one `(cached value, subscribed)` slot per link of the
//! [`AccessChain`]. A notification from link `i` can only change links after
//! `i`, so the rebuild resumes at `i + 1`; a link is only re-subscribed when
//! its value differs by identity from the cached one.
//!
//! # Invariants
//!
//! 1. At most one handler registration per link, always on the link's
//!    currently cached value.
//! 2. After the last observer leaves, no handler registered by this binding
//!    remains on any object.
//! 3. The engine holds observed objects (root included) only weakly. This
//!    covers the cached last result: a published `Value::Object` is kept as
//!    a weak handle and replays as `Unset` once the object is gone.
//! 4. Read failures are published as [`BindingValue::Error`]; nothing is
//!    raised to observers out of band.
//! 5. No `RefCell` borrow is held while user code (observers, object
//!    accessors, converters, writers) runs.
//! 6. A publish started by an observer supersedes the one that notified it:
//!    observers not yet reached only see the newer result.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Final read fails | `Error` published |
//! | Intermediate link fails | Links from the failure on are released; the final read decides what is published |
//! | Root dropped or `None` | Evaluation halts; last result kept (an object result only while it lives) |
//! | Write-back fails | Logged; binding re-evaluates and republishes |
//! | Write issued while a write is in flight | Dropped (`write` returns `false`) |

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::chain::{AccessChain, compile, compile_writer};
use crate::config::{BindingConfig, LinkCachePolicy};
use crate::error::{EvalError, ExprError};
use crate::expr::Expr;
use crate::notify::{self, ChangeHandler};
use crate::result::BindingValue;
use crate::source::{RootSink, RootSource, RootSubject, RootSubscription, SingleRoot};
use crate::value::{ObjectRef, Value, WeakObject};

/// Read function: full expression plus conversion, applied to the root.
pub type ReadFn<T> = Rc<dyn Fn(&Value) -> Result<T, EvalError>>;

/// Write-back function: conversion plus assignment, applied to the root.
pub type WriteFn<T> = Rc<dyn Fn(&Value, T) -> Result<(), EvalError>>;

type ObserverFn<T> = Rc<dyn Fn(&BindingValue<T>)>;

#[derive(Default)]
struct LinkState {
    value: Option<WeakObject>,
    subscribed: bool,
}

/// Last published result. Objects are held weakly; converted results of
/// other types are held as published.
enum Latest<T> {
    Held(BindingValue<T>),
    Object(WeakObject),
}

impl<T: Clone + 'static> Latest<T> {
    fn retain(result: &BindingValue<T>) -> Self {
        if let BindingValue::Value(value) = result {
            if let Some(Value::Object(object)) = (value as &dyn Any).downcast_ref::<Value>() {
                return Self::Object(Rc::downgrade(object));
            }
        }
        Self::Held(result.clone())
    }

    fn restore(&self) -> BindingValue<T> {
        match self {
            Self::Held(result) => result.clone(),
            Self::Object(weak) => {
                let Some(object) = weak.upgrade() else {
                    return BindingValue::Unset;
                };
                let boxed: Box<dyn Any> = Box::new(Value::Object(object));
                boxed
                    .downcast::<T>()
                    .map_or(BindingValue::Unset, |value| BindingValue::Value(*value))
            }
        }
    }
}

struct EvaluationState {
    root: Option<WeakObject>,
    links: Vec<LinkState>,
    root_subscription: Option<RootSubscription>,
}

struct Core<T> {
    this: Weak<Core<T>>,
    source: Rc<dyn RootSource>,
    read: ReadFn<T>,
    write: Option<WriteFn<T>>,
    chain: AccessChain,
    /// One handler per link; its identity is what gets registered.
    handlers: Vec<ChangeHandler>,
    description: String,
    config: BindingConfig,
    state: RefCell<EvaluationState>,
    observers: RefCell<Vec<(u64, ObserverFn<T>)>>,
    next_observer: Cell<u64>,
    last: RefCell<Latest<T>>,
    /// Bumped on every publish; lets `write` see whether its own side
    /// effects already republished.
    generation: Cell<u64>,
    writing: Cell<bool>,
}

fn cached_is(cached: Option<&WeakObject>, current: Option<&ObjectRef>) -> bool {
    match (cached, current) {
        (None, None) => true,
        (Some(cached), Some(current)) => std::ptr::addr_eq(cached.as_ptr(), Rc::as_ptr(current)),
        _ => false,
    }
}

impl<T> Core<T> {
    fn is_active(&self) -> bool {
        !self.observers.borrow().is_empty()
    }

    fn live_root(&self) -> Option<ObjectRef> {
        self.state.borrow().root.as_ref().and_then(Weak::upgrade)
    }

    fn listen(&self, from: usize) {
        let Some(root) = self.live_root() else {
            return;
        };
        let root = Value::Object(root);
        for (index, link) in self.chain.links().iter().enumerate().skip(from) {
            match link.eval(&root) {
                Ok(value) => self.update_link(index, value.as_object()),
                Err(error) => {
                    tracing::debug!(
                        binding = %self.description,
                        link = index,
                        path = link.path(),
                        %error,
                        "access chain broken"
                    );
                    self.stop_listening(index);
                    return;
                }
            }
        }
    }

    fn update_link(&self, index: usize, object: Option<&ObjectRef>) {
        let (previous, was_subscribed) = {
            let state = self.state.borrow();
            let link = &state.links[index];
            if cached_is(link.value.as_ref(), object) {
                return;
            }
            (link.value.clone(), link.subscribed)
        };

        let handler = &self.handlers[index];
        if was_subscribed {
            if let Some(old) = previous.as_ref().and_then(Weak::upgrade) {
                notify::unsubscribe(Some(&*old), handler);
            }
        }
        let attached = notify::subscribe(object.map(|o| &**o), handler);

        let cached = match self.config.link_cache {
            LinkCachePolicy::AdvanceOnChange => object.map(Rc::downgrade),
            LinkCachePolicy::AdvanceOnSubscribe if attached => object.map(Rc::downgrade),
            LinkCachePolicy::AdvanceOnSubscribe => None,
        };
        let mut state = self.state.borrow_mut();
        let link = &mut state.links[index];
        link.value = cached;
        link.subscribed = attached;
    }

    fn stop_listening(&self, from: usize) {
        let released: Vec<(usize, WeakObject)> = {
            let mut state = self.state.borrow_mut();
            state
                .links
                .iter_mut()
                .enumerate()
                .skip(from)
                .filter_map(|(index, link)| {
                    let value = link.value.take();
                    let subscribed = std::mem::take(&mut link.subscribed);
                    value.filter(|_| subscribed).map(|value| (index, value))
                })
                .collect()
        };
        for (index, value) in released {
            if let Some(object) = value.upgrade() {
                notify::unsubscribe(Some(&*object), &self.handlers[index]);
            }
        }
    }

    fn subscribed_link_count(&self) -> usize {
        self.state
            .borrow()
            .links
            .iter()
            .filter(|link| link.subscribed)
            .count()
    }
}

impl<T: Clone + 'static> Core<T> {
    fn attach(&self, observer: ObserverFn<T>) -> u64 {
        let id = self.next_observer.get();
        self.next_observer.set(id + 1);
        let first = {
            let mut observers = self.observers.borrow_mut();
            observers.push((id, Rc::clone(&observer)));
            observers.len() == 1
        };

        if first {
            self.initialize();
        } else if self.config.replay_latest {
            let last = self.last.borrow().restore();
            if !last.is_unset() {
                observer(&last);
            }
        }
        id
    }

    fn initialize(&self) {
        tracing::trace!(
            binding = %self.description,
            links = self.chain.len(),
            "binding initialize"
        );
        let weak = self.this.clone();
        let sink: RootSink = Rc::new(move |root: Option<ObjectRef>| {
            if let Some(core) = weak.upgrade() {
                core.root_changed(root);
            }
        });
        let subscription = self.source.subscribe(sink);
        // The first emission may already have detached every observer.
        if self.is_active() {
            self.state.borrow_mut().root_subscription = Some(subscription);
        }
    }

    fn deinitialize(&self) {
        tracing::trace!(binding = %self.description, "binding deinitialize");
        self.stop_listening(0);
        let subscription = {
            let mut state = self.state.borrow_mut();
            state.root = None;
            state.root_subscription.take()
        };
        drop(subscription);
        *self.last.borrow_mut() = Latest::Held(BindingValue::Unset);
    }

    fn root_changed(&self, root: Option<ObjectRef>) {
        if !self.is_active() {
            return;
        }
        tracing::trace!(
            binding = %self.description,
            has_root = root.is_some(),
            "binding root changed"
        );
        self.stop_listening(0);
        self.state.borrow_mut().root = root.as_ref().map(Rc::downgrade);
        if root.is_some() {
            self.listen(0);
            self.publish();
        }
    }

    fn chain_changed(&self, index: usize) {
        if !self.is_active() {
            return;
        }
        tracing::trace!(binding = %self.description, link = index, "chain changed");
        self.listen(index + 1);
        self.publish();
    }

    fn publish(&self) {
        let Some(root) = self.live_root() else {
            return;
        };
        let result = BindingValue::from_result((self.read)(&Value::Object(root)));
        match &result {
            BindingValue::Error(error) => {
                tracing::trace!(binding = %self.description, %error, "binding publish error");
            }
            _ => tracing::trace!(binding = %self.description, "binding publish"),
        }
        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);
        *self.last.borrow_mut() = Latest::retain(&result);

        let observers: Vec<ObserverFn<T>> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in observers {
            if self.generation.get() != generation {
                tracing::trace!(binding = %self.description, "binding publish superseded");
                break;
            }
            observer(&result);
        }
    }

    fn write(&self, value: T) -> bool {
        let Some(write) = self.write.clone() else {
            return false;
        };
        if self.writing.get() {
            tracing::debug!(binding = %self.description, "re-entrant write dropped");
            return false;
        }
        let Some(root) = self.live_root() else {
            return false;
        };

        self.writing.set(true);
        let generation = self.generation.get();
        let applied = match write(&Value::Object(root), value) {
            Ok(()) => {
                if self.generation.get() == generation {
                    self.listen(0);
                    self.publish();
                }
                true
            }
            Err(error) => {
                tracing::debug!(binding = %self.description, %error, "write-back failed");
                self.listen(0);
                self.publish();
                false
            }
        };
        self.writing.set(false);
        applied
    }
}

impl<T> Drop for Core<T> {
    fn drop(&mut self) {
        self.stop_listening(0);
    }
}

trait Detach {
    fn detach(&self, id: u64);
}

impl<T: Clone + 'static> Detach for Core<T> {
    fn detach(&self, id: u64) {
        let emptied = {
            let mut observers = self.observers.borrow_mut();
            let before = observers.len();
            observers.retain(|(oid, _)| *oid != id);
            before != observers.len() && observers.is_empty()
        };
        if emptied {
            self.deinitialize();
        }
    }
}

/// RAII guard for an observer of a [`BindingExpression`].
///
/// Dropping it detaches the observer; dropping the last one tears the
/// binding down.
#[must_use = "dropping a BindingSubscription detaches the observer"]
pub struct BindingSubscription {
    core: Option<Rc<dyn Detach>>,
    id: u64,
}

impl BindingSubscription {
    /// Detach now. Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for BindingSubscription {
    fn drop(&mut self) {
        if let Some(core) = self.core.take() {
            core.detach(self.id);
        }
    }
}

impl fmt::Debug for BindingSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSubscription")
            .field("id", &self.id)
            .finish()
    }
}

/// A live, push-updated binding over an access path.
///
/// Cloning yields another handle to the same binding.
pub struct BindingExpression<T> {
    core: Rc<Core<T>>,
}

impl<T> Clone for BindingExpression<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl BindingExpression<Value> {
    /// Read-only binding of `expr` against a fixed root.
    pub fn one_way(root: ObjectRef, expr: &Expr) -> Result<Self, ExprError> {
        Self::one_way_with(root, expr, Ok)
    }

    /// Read-only binding of `expr` against a changing root.
    pub fn one_way_from(source: Rc<dyn RootSource>, expr: &Expr) -> Result<Self, ExprError> {
        let read = compile(expr);
        Self::new(source, expr, read, None, BindingConfig::default())
    }

    /// Two-way binding of `expr` against a fixed root.
    pub fn two_way(root: ObjectRef, expr: &Expr) -> Result<Self, ExprError> {
        Self::two_way_with(root, expr, Ok, Ok)
    }
}

impl<T: Clone + 'static> BindingExpression<T> {
    /// Read-only binding whose values pass through `convert`.
    pub fn one_way_with(
        root: ObjectRef,
        expr: &Expr,
        convert: impl Fn(Value) -> Result<T, EvalError> + 'static,
    ) -> Result<Self, ExprError> {
        let read = compile(expr);
        Self::new(
            Rc::new(SingleRoot::new(&root)),
            expr,
            Rc::new(move |root: &Value| convert(read(root)?)),
            None,
            BindingConfig::default(),
        )
    }

    /// Two-way binding with a forward and a backward converter. The write
    /// side assigns through the final member or indexer of `expr`.
    pub fn two_way_with(
        root: ObjectRef,
        expr: &Expr,
        convert: impl Fn(Value) -> Result<T, EvalError> + 'static,
        convert_back: impl Fn(T) -> Result<Value, EvalError> + 'static,
    ) -> Result<Self, ExprError> {
        let read = compile(expr);
        let assign = compile_writer(expr)?;
        let write: WriteFn<T> = Rc::new(move |root: &Value, value: T| {
            assign(root, convert_back(value)?)
        });
        Self::new(
            Rc::new(SingleRoot::new(&root)),
            expr,
            Rc::new(move |root: &Value| convert(read(root)?)),
            Some(write),
            BindingConfig::default(),
        )
    }

    /// Two-way binding driven by a [`RootSubject`].
    pub fn two_way_from(
        subject: &RootSubject,
        expr: &Expr,
        convert: impl Fn(Value) -> Result<T, EvalError> + 'static,
        convert_back: impl Fn(T) -> Result<Value, EvalError> + 'static,
        config: BindingConfig,
    ) -> Result<Self, ExprError> {
        let read = compile(expr);
        let assign = compile_writer(expr)?;
        let write: WriteFn<T> = Rc::new(move |root: &Value, value: T| {
            assign(root, convert_back(value)?)
        });
        Self::new(
            Rc::new(subject.clone()),
            expr,
            Rc::new(move |root: &Value| convert(read(root)?)),
            Some(write),
            config,
        )
    }

    /// Fully general constructor.
    ///
    /// `expr` determines the watched chain and the description; `read`
    /// produces the published value and `write`, when present, performs
    /// write-back.
    pub fn new(
        source: Rc<dyn RootSource>,
        expr: &Expr,
        read: ReadFn<T>,
        write: Option<WriteFn<T>>,
        config: BindingConfig,
    ) -> Result<Self, ExprError> {
        let chain = AccessChain::build(expr)?;
        let description = expr.to_string();
        let link_count = chain.len();

        let core = Rc::new_cyclic(|this: &Weak<Core<T>>| {
            let handlers = (0..link_count)
                .map(|index| {
                    let weak = this.clone();
                    ChangeHandler::new(move |_| {
                        if let Some(core) = weak.upgrade() {
                            core.chain_changed(index);
                        }
                    })
                })
                .collect();
            Core {
                this: this.clone(),
                source,
                read,
                write,
                chain,
                handlers,
                description,
                config,
                state: RefCell::new(EvaluationState {
                    root: None,
                    links: (0..link_count).map(|_| LinkState::default()).collect(),
                    root_subscription: None,
                }),
                observers: RefCell::new(Vec::new()),
                next_observer: Cell::new(0),
                last: RefCell::new(Latest::Held(BindingValue::Unset)),
                generation: Cell::new(0),
                writing: Cell::new(false),
            }
        });
        Ok(Self { core })
    }

    /// Attach an observer. The first observer starts the binding; later
    /// observers immediately receive the last published value.
    pub fn subscribe(
        &self,
        observer: impl Fn(&BindingValue<T>) + 'static,
    ) -> BindingSubscription {
        let id = self.core.attach(Rc::new(observer));
        let core: Rc<dyn Detach> = Rc::clone(&self.core) as Rc<dyn Detach>;
        BindingSubscription {
            core: Some(core),
            id,
        }
    }

    /// Write `value` back into the source graph.
    ///
    /// Returns `true` when the write was applied. Returns `false` for
    /// one-way bindings, when no live root is available, when the writer
    /// failed (the binding still republishes) or when called re-entrantly
    /// from inside another write.
    pub fn write(&self, value: T) -> bool {
        self.core.write(value)
    }

    /// Last published value (`Unset` before the first publish, after
    /// teardown, and once a published object has been dropped).
    #[must_use]
    pub fn current(&self) -> BindingValue<T> {
        self.core.last.borrow().restore()
    }
}

impl<T> BindingExpression<T> {
    /// Whether at least one observer is attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.core.observers.borrow().len()
    }

    /// Number of links in the watched chain.
    #[must_use]
    pub fn chain_len(&self) -> usize {
        self.core.chain.len()
    }

    /// Number of links currently holding a change subscription.
    #[must_use]
    pub fn subscribed_link_count(&self) -> usize {
        self.core.subscribed_link_count()
    }

    #[must_use]
    pub fn is_two_way(&self) -> bool {
        self.core.write.is_some()
    }

    /// The binding path, e.g. `Foo.Bar[1]`.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.core.description
    }

    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.core.config
    }
}

impl<T> fmt::Debug for BindingExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingExpression")
            .field("path", &self.core.description)
            .field("observers", &self.observer_count())
            .field("subscribed_links", &self.subscribed_link_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::objects::{ObservableObject, Record};

    type Log<T> = Rc<RefCell<Vec<BindingValue<T>>>>;

    fn record<T: Clone + 'static>(binding: &BindingExpression<T>) -> (BindingSubscription, Log<T>) {
        let log: Log<T> = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = binding.subscribe(move |v| l.borrow_mut().push(v.clone()));
        (sub, log)
    }

    #[test]
    fn first_subscriber_receives_initial_value() {
        let data = Rc::new(ObservableObject::new("Vm").with_field("Foo", "foo"));
        let binding = BindingExpression::one_way(data.clone(), &Expr::root().member("Foo")).unwrap();
        assert!(!binding.is_active());

        let (_sub, log) = record(&binding);
        assert_eq!(*log.borrow(), vec![BindingValue::Value(Value::from("foo"))]);
        assert!(binding.is_active());
        assert_eq!(data.property_subscriber_count(), 1);
    }

    #[test]
    fn property_change_republishes() {
        let data = Rc::new(ObservableObject::new("Vm").with_field("Foo", "a"));
        let binding = BindingExpression::one_way(data.clone(), &Expr::root().member("Foo")).unwrap();
        let (_sub, log) = record(&binding);

        data.set("Foo", "b");
        assert_eq!(
            *log.borrow(),
            vec![
                BindingValue::Value(Value::from("a")),
                BindingValue::Value(Value::from("b"))
            ]
        );
    }

    #[test]
    fn root_only_expression_reads_root() {
        let data = Rc::new(Record::new("Vm"));
        let binding = BindingExpression::one_way(data.clone(), &Expr::root()).unwrap();
        assert_eq!(binding.chain_len(), 0);
        let (_sub, log) = record(&binding);
        assert_eq!(
            *log.borrow(),
            vec![BindingValue::Value(Value::from(data.clone()))]
        );
        assert_eq!(binding.subscribed_link_count(), 0);
    }

    #[test]
    fn read_failure_is_published_as_error() {
        let data = Rc::new(Record::new("Vm"));
        let binding = BindingExpression::one_way(data.clone(), &Expr::root().member("Missing")).unwrap();
        let (_sub, log) = record(&binding);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].error_kind(), Some(ErrorKind::MemberNotFound));
    }

    #[test]
    fn last_unsubscribe_tears_down() {
        let data = Rc::new(ObservableObject::new("Vm").with_field("Foo", "a"));
        let binding = BindingExpression::one_way(data.clone(), &Expr::root().member("Foo")).unwrap();
        let (a, _) = record(&binding);
        let (b, _) = record(&binding);
        assert_eq!(binding.observer_count(), 2);
        drop(a);
        assert_eq!(data.property_subscriber_count(), 1);
        b.unsubscribe();
        assert_eq!(data.property_subscriber_count(), 0);
        assert!(binding.current().is_unset());
        assert!(!binding.is_active());
    }

    #[test]
    fn resubscribe_after_teardown_starts_fresh() {
        let data = Rc::new(ObservableObject::new("Vm").with_field("Foo", "a"));
        let binding = BindingExpression::one_way(data.clone(), &Expr::root().member("Foo")).unwrap();
        let (sub, _) = record(&binding);
        drop(sub);

        data.set("Foo", "b");
        let (_sub, log) = record(&binding);
        assert_eq!(*log.borrow(), vec![BindingValue::Value(Value::from("b"))]);
    }

    #[test]
    fn one_way_binding_rejects_write() {
        let data = Rc::new(Record::new("Vm").with_field("Foo", "a"));
        let binding = BindingExpression::one_way(data.clone(), &Expr::root().member("Foo")).unwrap();
        let _sub = binding.subscribe(|_| {});
        assert!(!binding.is_two_way());
        assert!(!binding.write(Value::from("b")));
        assert_eq!(data.get("Foo"), Some(Value::from("a")));
    }

    #[test]
    fn write_without_observers_is_not_applied() {
        let data = Rc::new(Record::new("Vm").with_field("Foo", "a"));
        let binding = BindingExpression::two_way(data.clone(), &Expr::root().member("Foo")).unwrap();
        assert!(!binding.write(Value::from("b")));
        assert_eq!(data.get("Foo"), Some(Value::from("a")));
    }

    #[test]
    fn two_way_requires_assignable_expression() {
        let data = Rc::new(Record::new("Vm"));
        let err = BindingExpression::two_way(data, &Expr::root().call("Get", [1])).unwrap_err();
        assert!(matches!(err, ExprError::NotAssignable { .. }));
    }

    #[test]
    fn debug_shows_path() {
        let data = Rc::new(Record::new("Vm"));
        let binding = BindingExpression::one_way(data, &Expr::root().member("Foo").index([1])).unwrap();
        let debug = format!("{binding:?}");
        assert!(debug.contains("Foo[1]"));
        assert_eq!(binding.description(), "Foo[1]");
    }
}
