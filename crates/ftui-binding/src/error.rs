#![forbid(unsafe_code)]

//! Error types for binding evaluation and construction.
//!
//! Nothing in this crate panics on bad data. Failures fall into three groups:
//!
//! | Error | Raised by | Surfaces as |
//! |-------|-----------|-------------|
//! | [`EvalError`] | Reading or writing through an access path | `BindingValue::Error` on the stream |
//! | [`ExprError`] | Building a chain or writer from an [`Expr`](crate::Expr) | `Err` from the constructor |
//! | [`InvalidState`] | Accessing the wrong arm of a `BindingValue` | `Err` from the accessor |

use thiserror::Error;

/// Failure while evaluating an access expression against live objects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A member, indexer or method was applied to `Null`.
    #[error("null reference while accessing '{access}'")]
    NullReference { access: String },

    /// The receiver has no member with this name.
    #[error("'{type_name}' has no member '{member}'")]
    MemberNotFound { type_name: String, member: String },

    /// Array-style index outside the array bounds.
    #[error("index {index} is outside the bounds of the array (length {len})")]
    IndexOutOfRange { index: i64, len: usize },

    /// List-style index outside the valid argument range.
    #[error("index {index} is out of range; must be less than the size of the collection ({len})")]
    ArgumentOutOfRange { index: i64, len: usize },

    /// Keyed lookup for a key that is not present.
    #[error("key '{key}' was not present")]
    KeyNotFound { key: String },

    /// A value had the wrong runtime type for the operation.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// Indexer or method invoked with the wrong number of arguments.
    #[error("expected {expected} argument(s), got {found}")]
    ArgumentCount { expected: usize, found: usize },

    /// The receiver has no callable method with this name.
    #[error("'{type_name}' has no method '{method}'")]
    MethodNotFound { type_name: String, method: String },

    /// The receiver does not support indexing.
    #[error("'{type_name}' cannot be indexed")]
    NotIndexable { type_name: String },

    /// The member or indexer exists but cannot be assigned.
    #[error("'{type_name}.{member}' is read-only")]
    ReadOnly { type_name: String, member: String },

    /// A value converter rejected its input.
    #[error("conversion failed: {message}")]
    Conversion { message: String },
}

/// Coarse category of an [`EvalError`], for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NullReference,
    MemberNotFound,
    IndexOutOfRange,
    ArgumentOutOfRange,
    KeyNotFound,
    TypeMismatch,
    ArgumentCount,
    MethodNotFound,
    NotIndexable,
    ReadOnly,
    Conversion,
}

impl EvalError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NullReference { .. } => ErrorKind::NullReference,
            Self::MemberNotFound { .. } => ErrorKind::MemberNotFound,
            Self::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Self::ArgumentOutOfRange { .. } => ErrorKind::ArgumentOutOfRange,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::ArgumentCount { .. } => ErrorKind::ArgumentCount,
            Self::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            Self::NotIndexable { .. } => ErrorKind::NotIndexable,
            Self::ReadOnly { .. } => ErrorKind::ReadOnly,
            Self::Conversion { .. } => ErrorKind::Conversion,
        }
    }

    /// Shorthand for a converter failure.
    #[must_use]
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    pub(crate) fn member_not_found(type_name: &str, member: &str) -> Self {
        Self::MemberNotFound {
            type_name: type_name.to_owned(),
            member: member.to_owned(),
        }
    }

    pub(crate) fn method_not_found(type_name: &str, method: &str) -> Self {
        Self::MethodNotFound {
            type_name: type_name.to_owned(),
            method: method.to_owned(),
        }
    }

    pub(crate) fn not_indexable(type_name: &str) -> Self {
        Self::NotIndexable {
            type_name: type_name.to_owned(),
        }
    }

    pub(crate) fn read_only(type_name: &str, member: &str) -> Self {
        Self::ReadOnly {
            type_name: type_name.to_owned(),
            member: member.to_owned(),
        }
    }
}

/// An access expression that cannot be turned into a binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// A member access or method call with an empty name.
    #[error("empty {what} name in access expression")]
    EmptyName { what: &'static str },

    /// A member or method name that is not an identifier.
    #[error("'{name}' is not a valid identifier")]
    InvalidIdentifier { name: String },

    /// An indexer access with no arguments.
    #[error("indexer access requires at least one argument")]
    NoIndexArguments,

    /// Write-back was requested for an expression that does not end in a
    /// member or indexer access.
    #[error("'{path}' is not assignable")]
    NotAssignable { path: String },
}

/// A [`BindingValue`](crate::BindingValue) accessor was used on the wrong arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid binding value state: expected {expected}, found {found}")]
pub struct InvalidState {
    pub expected: &'static str,
    pub found: &'static str,
}
