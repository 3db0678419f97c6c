#![forbid(unsafe_code)]

//! Dynamic values and the object protocol bindings evaluate against.
//!
//! A binding path such as `Foo.Bar[1]` is resolved at runtime, so every
//! intermediate result is a [`Value`]. Scalars are stored inline; everything
//! else is an [`ObjectRef`], a shared handle to a type implementing
//! [`DataObject`].
//!
//! # Invariants
//!
//! 1. `Value::Object` equality is identity (same allocation), never
//!    structural. Two distinct objects with equal contents are different
//!    values.
//! 2. Every accessor returns `Result`; a missing member, bad index or
//!    unsupported operation is an [`EvalError`], not a panic.
//! 3. Any access on [`Value::Null`] is [`EvalError::NullReference`].

use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::EvalError;
use crate::notify::{NotifyCollectionChanged, NotifyPropertyChanged};

/// Shared handle to a data object.
pub type ObjectRef = Rc<dyn DataObject>;

/// Non-owning handle to a data object.
pub type WeakObject = Weak<dyn DataObject>;

/// Runtime protocol for objects reachable through a binding path.
///
/// Every method except [`type_name`](Self::type_name) has a default that
/// reports the operation as unsupported, so an implementer only overrides
/// what the type actually offers.
///
/// Mutating methods take `&self`: data objects are shared through `Rc` and
/// use interior mutability, the same way UI state is shared elsewhere in
/// the runtime.
pub trait DataObject {
    /// Name used in diagnostics and binding descriptions.
    fn type_name(&self) -> &str;

    /// Read a named member.
    fn get_member(&self, name: &str) -> Result<Value, EvalError> {
        Err(EvalError::member_not_found(self.type_name(), name))
    }

    /// Assign a named member.
    fn set_member(&self, name: &str, _value: Value) -> Result<(), EvalError> {
        Err(EvalError::read_only(self.type_name(), name))
    }

    /// Read through the indexer.
    fn get_index(&self, _args: &[Value]) -> Result<Value, EvalError> {
        Err(EvalError::not_indexable(self.type_name()))
    }

    /// Assign through the indexer.
    fn set_index(&self, _args: &[Value], _value: Value) -> Result<(), EvalError> {
        Err(EvalError::not_indexable(self.type_name()))
    }

    /// Invoke a side-effect-free instance method.
    fn call(&self, method: &str, _args: &[Value]) -> Result<Value, EvalError> {
        Err(EvalError::method_not_found(self.type_name(), method))
    }

    /// Property-changed capability, if the object raises it.
    fn property_notifier(&self) -> Option<&dyn NotifyPropertyChanged> {
        None
    }

    /// Collection-changed capability, if the object raises it.
    fn collection_notifier(&self) -> Option<&dyn NotifyCollectionChanged> {
        None
    }
}

/// A dynamically typed value flowing through a binding path.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Object(ObjectRef),
}

/// Identity comparison for object handles, ignoring vtable metadata.
#[must_use]
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

impl Value {
    /// Wrap a concrete data object.
    pub fn object<O: DataObject + 'static>(object: O) -> Self {
        Self::Object(Rc::new(object))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Runtime type name, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Object(object) => object.type_name(),
        }
    }

    /// Read `self.name`.
    pub fn member(&self, name: &str) -> Result<Value, EvalError> {
        match self {
            Self::Null => Err(null_reference(name)),
            Self::Object(object) => object.get_member(name),
            Self::Str(s) if name == "Length" => Ok(Value::Int(s.chars().count() as i64)),
            other => Err(EvalError::member_not_found(other.type_name(), name)),
        }
    }

    /// Read `self[args]`.
    pub fn index(&self, args: &[Value]) -> Result<Value, EvalError> {
        match self {
            Self::Null => Err(null_reference("[]")),
            Self::Object(object) => object.get_index(args),
            Self::Str(s) => {
                let index = index_arg(args)?;
                let len = s.chars().count();
                usize::try_from(index)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::from(c.to_string()))
                    .ok_or(EvalError::IndexOutOfRange { index, len })
            }
            other => Err(EvalError::not_indexable(other.type_name())),
        }
    }

    /// Invoke `self.method(args)`.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value, EvalError> {
        match self {
            Self::Null => Err(null_reference(method)),
            Self::Object(object) => object.call(method, args),
            Self::Str(s) => {
                expect_args(args, 0)?;
                match method {
                    "ToUpper" => Ok(Value::from(s.to_uppercase())),
                    "ToLower" => Ok(Value::from(s.to_lowercase())),
                    "Trim" => Ok(Value::from(s.trim())),
                    _ => Err(EvalError::method_not_found("string", method)),
                }
            }
            other => Err(EvalError::method_not_found(other.type_name(), method)),
        }
    }

    /// Assign `self.name = value`.
    pub fn assign_member(&self, name: &str, value: Value) -> Result<(), EvalError> {
        match self {
            Self::Null => Err(null_reference(name)),
            Self::Object(object) => object.set_member(name, value),
            other => Err(EvalError::read_only(other.type_name(), name)),
        }
    }

    /// Assign `self[args] = value`.
    pub fn assign_index(&self, args: &[Value], value: Value) -> Result<(), EvalError> {
        match self {
            Self::Null => Err(null_reference("[]")),
            Self::Object(object) => object.set_index(args, value),
            other => Err(EvalError::read_only(other.type_name(), "[]")),
        }
    }
}

fn null_reference(access: &str) -> EvalError {
    EvalError::NullReference {
        access: access.to_owned(),
    }
}

/// Check an argument list has exactly `expected` entries.
pub fn expect_args(args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::ArgumentCount {
            expected,
            found: args.len(),
        })
    }
}

/// Extract a single integer index argument.
pub fn index_arg(args: &[Value]) -> Result<i64, EvalError> {
    expect_args(args, 1)?;
    int_arg(&args[0])
}

/// Extract a single string key argument.
pub fn key_arg(args: &[Value]) -> Result<&str, EvalError> {
    expect_args(args, 1)?;
    args[0].as_str().ok_or_else(|| EvalError::TypeMismatch {
        expected: "string",
        found: args[0].type_name().to_owned(),
    })
}

pub(crate) fn int_arg(arg: &Value) -> Result<i64, EvalError> {
    arg.as_int().ok_or_else(|| EvalError::TypeMismatch {
        expected: "int",
        found: arg.type_name().to_owned(),
    })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => same_object(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(&&**s).finish(),
            Self::Object(object) => write!(f, "Object({})", object.type_name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Object(object) => f.write_str(object.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Self::Str(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

impl<O: DataObject + 'static> From<Rc<O>> for Value {
    fn from(value: Rc<O>) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
