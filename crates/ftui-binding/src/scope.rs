#![forbid(unsafe_code)]

//! Lifetime grouping for binding subscriptions.

use crate::expression::{BindingExpression, BindingSubscription};
use crate::result::BindingValue;

/// Collects binding subscriptions for a logical scope (e.g., a widget).
///
/// When the scope is dropped, all held subscriptions are released, tearing
/// down every binding whose last observer lived here.
///
/// # Usage
///
/// ```
/// use std::rc::Rc;
/// use ftui_binding::{BindingExpression, BindingScope, Expr, ObservableObject};
///
/// let vm = Rc::new(ObservableObject::new("ViewModel").with_field("Title", "hello"));
/// let title = BindingExpression::one_way(vm.clone(), &Expr::root().member("Title")).unwrap();
///
/// let mut scope = BindingScope::new();
/// scope.subscribe(&title, |v| println!("title: {v:?}"));
/// assert_eq!(vm.property_subscriber_count(), 1);
///
/// drop(scope);
/// assert_eq!(vm.property_subscriber_count(), 0);
/// ```
///
/// # Invariants
///
/// 1. Subscriptions are released in reverse registration order on drop and
///    on `clear()`.
/// 2. After drop, no observer registered through this scope fires.
/// 3. `clear()` releases all subscriptions immediately (reusable scope).
pub struct BindingScope {
    subscriptions: Vec<BindingSubscription>,
}

impl BindingScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Keep `sub` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: BindingSubscription) {
        self.subscriptions.push(sub);
    }

    /// Observe `binding` for the lifetime of this scope.
    ///
    /// Returns the scope for chaining.
    pub fn subscribe<T: Clone + 'static>(
        &mut self,
        binding: &BindingExpression<T>,
        observer: impl Fn(&BindingValue<T>) + 'static,
    ) -> &mut Self {
        let sub = binding.subscribe(observer);
        self.subscriptions.push(sub);
        self
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release all subscriptions now; the scope stays usable.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            drop(sub);
        }
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl Default for BindingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.subscriptions.len())
            .finish()
    }
}
