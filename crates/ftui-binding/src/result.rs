#![forbid(unsafe_code)]

//! Three-state outcome published by a binding.

use std::rc::Rc;

use crate::error::{ErrorKind, EvalError, InvalidState};

/// Shared, immutable evaluation failure carried by [`BindingValue::Error`].
pub type BindingError = Rc<EvalError>;

/// Outcome of evaluating a binding.
///
/// `Unset` only exists before the first evaluation. Equality is structural
/// for `Value`; two `Error`s are equal only when they are the same error
/// instance. Use [`error_kind`](Self::error_kind) to compare categories.
#[derive(Debug, Clone, Default)]
pub enum BindingValue<T> {
    #[default]
    Unset,
    Value(T),
    Error(BindingError),
}

impl<T> BindingValue<T> {
    /// Wrap an evaluation outcome.
    pub fn from_result(result: Result<T, EvalError>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(error) => Self::Error(Rc::new(error)),
        }
    }

    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The produced value, or [`InvalidState`] for `Unset` / `Error`.
    pub fn value(&self) -> Result<&T, InvalidState> {
        match self {
            Self::Value(value) => Ok(value),
            other => Err(InvalidState {
                expected: "value",
                found: other.state_name(),
            }),
        }
    }

    /// The failure, or [`InvalidState`] for `Unset` / `Value`.
    pub fn error(&self) -> Result<&BindingError, InvalidState> {
        match self {
            Self::Error(error) => Ok(error),
            other => Err(InvalidState {
                expected: "error",
                found: other.state_name(),
            }),
        }
    }

    /// Category of the failure, if this is an `Error`.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error(error) => Some(error.kind()),
            _ => None,
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BindingValue<U> {
        match self {
            Self::Unset => BindingValue::Unset,
            Self::Value(value) => BindingValue::Value(f(value)),
            Self::Error(error) => BindingValue::Error(error),
        }
    }

    /// `None` for `Unset`, otherwise the outcome as a `Result`.
    #[must_use]
    pub fn into_result(self) -> Option<Result<T, BindingError>> {
        match self {
            Self::Unset => None,
            Self::Value(value) => Some(Ok(value)),
            Self::Error(error) => Some(Err(error)),
        }
    }

    fn state_name(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Value(_) => "value",
            Self::Error(_) => "error",
        }
    }
}

impl<T: PartialEq> PartialEq for BindingValue<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unset, Self::Unset) => true,
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Error(a), Self::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
