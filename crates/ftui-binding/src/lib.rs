#![forbid(unsafe_code)]

//! Property-path data bindings for FrankenTUI.
//!
//! This crate provides:
//! - [`Expr`] for describing access paths (`Foo.Bar[0].Baz`) over dynamic
//!   [`DataObject`]s
//! - [`AccessChain`] which decomposes a path into the intermediate links that
//!   must be watched
//! - [`BindingExpression`] which watches every link and publishes a
//!   [`BindingValue`] whenever anything along the path changes
//! - [`RootSubject`] / [`SingleRoot`] for supplying the binding root
//! - ready-made notifying objects ([`ObservableObject`], [`ObservableList`],
//!   [`ObservableDictionary`]) plus plain [`Record`] and [`ArrayObject`]
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use ftui_binding::{BindingExpression, BindingValue, Expr, ObservableObject, Value};
//!
//! let child = Rc::new(ObservableObject::new("Child").with_field("Name", "a"));
//! let vm = Rc::new(ObservableObject::new("Vm").with_field("Child", child.clone()));
//!
//! let path = Expr::root().member("Child").member("Name");
//! let binding = BindingExpression::one_way(vm.clone(), &path).unwrap();
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let s = Rc::clone(&seen);
//! let _sub = binding.subscribe(move |v| s.borrow_mut().push(v.clone()));
//!
//! child.set("Name", "b");
//! vm.set("Child", Rc::new(ObservableObject::new("Child").with_field("Name", "c")));
//!
//! assert_eq!(
//!     *seen.borrow(),
//!     vec![
//!         BindingValue::Value(Value::from("a")),
//!         BindingValue::Value(Value::from("b")),
//!         BindingValue::Value(Value::from("c")),
//!     ]
//! );
//! ```
//!
//! Everything here is single-threaded (`Rc`/`RefCell`), matching the rest of
//! the UI runtime.

pub mod chain;
pub mod config;
pub mod error;
pub mod expr;
pub mod expression;
pub mod notify;
pub mod objects;
pub mod result;
pub mod scope;
pub mod source;
pub mod value;

pub use chain::{AccessChain, Assigner, Evaluator, Link, compile, compile_writer};
#[cfg(feature = "policy-config")]
pub use config::ConfigError;
pub use config::{BindingConfig, LinkCachePolicy};
pub use error::{ErrorKind, EvalError, ExprError, InvalidState};
pub use expr::Expr;
pub use expression::{BindingExpression, BindingSubscription, ReadFn, WriteFn};
pub use notify::{
    ChangeHandler, ChangeNotice, CollectionAction, HandlerList, NotifyCapability,
    NotifyCollectionChanged, NotifyPropertyChanged,
};
pub use objects::{
    ArrayObject, COUNT_NAME, INDEXER_NAME, ObservableDictionary, ObservableList, ObservableObject,
    Record,
};
pub use result::{BindingError, BindingValue};
pub use scope::BindingScope;
pub use source::{RootSink, RootSource, RootSubject, RootSubscription, SingleRoot};
pub use value::{DataObject, ObjectRef, Value, WeakObject, same_object};
