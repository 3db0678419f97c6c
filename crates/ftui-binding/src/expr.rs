#![forbid(unsafe_code)]

//! Access-expression AST.
//!
//! An [`Expr`] describes a path from the binding root through member reads,
//! indexers and method calls, e.g. `root.Items[2].Name.ToUpper()`. Indexer
//! and method arguments are constants: a binding path never captures state
//! that could change behind the engine's back.
//!
//! ```
//! use ftui_binding::Expr;
//!
//! let path = Expr::root().member("Items").index([2]).member("Name");
//! assert_eq!(path.to_string(), "Items[2].Name");
//! assert_eq!(path.access_count(), 3);
//! ```

use std::fmt;
use std::rc::Rc;

use crate::error::ExprError;
use crate::value::Value;

/// A restricted property-access expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The binding root.
    Root,
    /// `target.name`
    Member { target: Box<Expr>, name: Rc<str> },
    /// `target[args]`
    Index { target: Box<Expr>, args: Vec<Value> },
    /// `target.method(args)`
    Call {
        target: Box<Expr>,
        method: Rc<str>,
        args: Vec<Value>,
    },
}

impl Expr {
    #[must_use]
    pub fn root() -> Self {
        Self::Root
    }

    #[must_use]
    pub fn member(self, name: impl Into<Rc<str>>) -> Self {
        Self::Member {
            target: Box::new(self),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn index<I, V>(self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Index {
            target: Box::new(self),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn call<I, V>(self, method: impl Into<Rc<str>>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Call {
            target: Box::new(self),
            method: method.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The receiver of this access, or `None` for the root.
    #[must_use]
    pub fn target(&self) -> Option<&Expr> {
        match self {
            Self::Root => None,
            Self::Member { target, .. } | Self::Index { target, .. } | Self::Call { target, .. } => {
                Some(&**target)
            }
        }
    }

    /// Number of member, indexer and call accesses in the path.
    #[must_use]
    pub fn access_count(&self) -> usize {
        let mut count = 0;
        let mut node = self;
        while let Some(target) = node.target() {
            count += 1;
            node = target;
        }
        count
    }

    /// Reject names and argument lists no access can be resolved with.
    pub fn validate(&self) -> Result<(), ExprError> {
        let mut node = self;
        loop {
            match node {
                Self::Root => return Ok(()),
                Self::Member { target, name } => {
                    check_identifier(name, "member")?;
                    node = &**target;
                }
                Self::Index { target, args } => {
                    if args.is_empty() {
                        return Err(ExprError::NoIndexArguments);
                    }
                    node = &**target;
                }
                Self::Call { target, method, .. } => {
                    check_identifier(method, "method")?;
                    node = &**target;
                }
            }
        }
    }
}

fn check_identifier(name: &str, what: &'static str) -> Result<(), ExprError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(ExprError::EmptyName { what });
    };
    if (first.is_alphabetic() || first == '_') && chars.all(|c| c.is_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ExprError::InvalidIdentifier {
            name: name.to_owned(),
        })
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Value]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match arg {
            Value::Str(s) => write!(f, "{s:?}")?,
            other => write!(f, "{other}")?,
        }
    }
    Ok(())
}

/// Renders the binding path without the implicit root, e.g.
/// `Foo.Bar[1, "x"].Get(2)`. The bare root renders as `.`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("."),
            Self::Member { target, name } => {
                if **target != Self::Root {
                    write!(f, "{target}.")?;
                }
                f.write_str(name)
            }
            Self::Index { target, args } => {
                if **target != Self::Root {
                    write!(f, "{target}")?;
                }
                f.write_str("[")?;
                write_args(f, args)?;
                f.write_str("]")
            }
            Self::Call {
                target,
                method,
                args,
            } => {
                if **target != Self::Root {
                    write!(f, "{target}.")?;
                }
                write!(f, "{method}(")?;
                write_args(f, args)?;
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_paths() {
        assert_eq!(Expr::root().to_string(), ".");
        assert_eq!(Expr::root().member("Foo").to_string(), "Foo");
        assert_eq!(
            Expr::root()
                .member("Foo")
                .index([Value::Int(1), Value::from("x")])
                .call("Get", [2])
                .to_string(),
            "Foo[1, \"x\"].Get(2)"
        );
        assert_eq!(Expr::root().index([1]).to_string(), "[1]");
        assert_eq!(Expr::root().call("Trim", Vec::<Value>::new()).to_string(), "Trim()");
    }

    #[test]
    fn access_count_walks_to_root() {
        assert_eq!(Expr::root().access_count(), 0);
        let e = Expr::root().member("A").member("B").index([0]);
        assert_eq!(e.access_count(), 3);
        assert_eq!(e.target().map(Expr::access_count), Some(2));
    }

    #[test]
    fn validate_accepts_well_formed_paths() {
        let e = Expr::root().member("Foo_1").index([0]).call("Get", [1]);
        assert_eq!(e.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_bad_names() {
        assert_eq!(
            Expr::root().member("").validate(),
            Err(ExprError::EmptyName { what: "member" })
        );
        assert_eq!(
            Expr::root().member("Foo").member("1x").validate(),
            Err(ExprError::InvalidIdentifier { name: "1x".into() })
        );
        assert_eq!(
            Expr::root().call("", [1]).validate(),
            Err(ExprError::EmptyName { what: "method" })
        );
    }

    #[test]
    fn validate_rejects_empty_indexer() {
        let e = Expr::root().member("Foo").index(Vec::<Value>::new());
        assert_eq!(e.validate(), Err(ExprError::NoIndexArguments));
    }
}
