#![forbid(unsafe_code)]

//! Decomposition of an access expression into link evaluators.
//!
//! For `root.Foo.Bar[1]` the engine has to watch every object whose change
//! could alter the result: the root (it owns `Foo`), `root.Foo` (it owns
//! `Bar`) and `root.Foo.Bar` (it owns the indexer). Each of those receivers
//! is a [`Link`]; [`AccessChain::build`] produces them ordered root to leaf:
//!
//! | Link | Evaluates | Watched for |
//! |------|-----------|-------------|
//! | 0 | `root` | `Foo` |
//! | 1 | `root.Foo` | `Bar` |
//! | 2 | `root.Foo.Bar` | `[1]` |
//!
//! Expressions are compiled once into nested closures ([`compile`]); no AST
//! walking happens at notification time.
//!
//! # Invariants
//!
//! 1. `chain.len() == expr.access_count()`.
//! 2. Link `i` evaluates the receiver of the `i`-th access counted from the
//!    root.
//! 3. Building is pure: the same expression always yields an equivalent
//!    chain and never touches a data object.

use std::fmt;
use std::rc::Rc;

use crate::error::{EvalError, ExprError};
use crate::expr::Expr;
use crate::value::Value;

/// Compiled read of an expression applied to a root.
pub type Evaluator = Rc<dyn Fn(&Value) -> Result<Value, EvalError>>;

/// Compiled assignment through an expression applied to a root.
pub type Assigner = Rc<dyn Fn(&Value, Value) -> Result<(), EvalError>>;

/// One receiver in an access chain.
#[derive(Clone)]
pub struct Link {
    eval: Evaluator,
    path: String,
}

impl Link {
    /// Evaluate this link's receiver for `root`.
    pub fn eval(&self, root: &Value) -> Result<Value, EvalError> {
        (self.eval)(root)
    }

    /// Path of the receiver, as rendered by [`Expr`]'s `Display`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("path", &self.path).finish()
    }
}

/// Ordered receivers of an access expression.
#[derive(Debug, Clone, Default)]
pub struct AccessChain {
    links: Vec<Link>,
}

impl AccessChain {
    /// Decompose `expr` into its receiver links.
    pub fn build(expr: &Expr) -> Result<Self, ExprError> {
        expr.validate()?;

        // Outermost access first, then reversed into root-to-leaf order.
        let mut links = Vec::with_capacity(expr.access_count());
        let mut node = expr;
        while let Some(target) = node.target() {
            links.push(Link {
                eval: compile(target),
                path: target.to_string(),
            });
            node = target;
        }
        links.reverse();
        Ok(Self { links })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }
}

/// Compile `expr` into a closure that evaluates it against a root.
#[must_use]
pub fn compile(expr: &Expr) -> Evaluator {
    match expr {
        Expr::Root => Rc::new(|root: &Value| Ok(root.clone())),
        Expr::Member { target, name } => {
            let target = compile(target);
            let name = Rc::clone(name);
            Rc::new(move |root: &Value| target(root)?.member(&name))
        }
        Expr::Index { target, args } => {
            let target = compile(target);
            let args = args.clone();
            Rc::new(move |root: &Value| target(root)?.index(&args))
        }
        Expr::Call {
            target,
            method,
            args,
        } => {
            let target = compile(target);
            let method = Rc::clone(method);
            let args = args.clone();
            Rc::new(move |root: &Value| target(root)?.call(&method, &args))
        }
    }
}

/// Compile the assignment `expr = value`.
///
/// Only expressions ending in a member or indexer access can be assigned.
pub fn compile_writer(expr: &Expr) -> Result<Assigner, ExprError> {
    expr.validate()?;
    match expr {
        Expr::Member { target, name } => {
            let target = compile(target);
            let name = Rc::clone(name);
            Ok(Rc::new(move |root: &Value, value: Value| {
                target(root)?.assign_member(&name, value)
            }))
        }
        Expr::Index { target, args } => {
            let target = compile(target);
            let args = args.clone();
            Ok(Rc::new(move |root: &Value, value: Value| {
                target(root)?.assign_index(&args, value)
            }))
        }
        Expr::Root | Expr::Call { .. } => Err(ExprError::NotAssignable {
            path: expr.to_string(),
        }),
    }
}
