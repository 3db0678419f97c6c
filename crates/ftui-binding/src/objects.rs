#![forbid(unsafe_code)]

//! Ready-made data objects.
//!
//! | Type | Members | Indexer | Notifies |
//! |------|---------|---------|----------|
//! | [`Record`] | named fields | none | nothing |
//! | [`ObservableObject`] | named fields | none | property changed |
//! | [`ArrayObject`] | `Length`, `Rank` | `[i, j, ..]`, `IndexOutOfRange` | nothing |
//! | [`ObservableList`] | `Count` | `[i]`, `ArgumentOutOfRange` | collection changed + `Count` |
//! | [`ObservableDictionary`] | `Count` | `["key"]`, `KeyNotFound` | property changed (`Item[]`, `Count`) |
//!
//! Notifications are raised after the mutation completes and after every
//! internal borrow is released, so handlers may read (or mutate) the object
//! that notified them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::EvalError;
use crate::notify::{
    ChangeHandler, ChangeNotice, CollectionAction, HandlerList, NotifyCollectionChanged,
    NotifyPropertyChanged,
};
use crate::value::{DataObject, Value, expect_args, index_arg, int_arg, key_arg};

/// Member name announced when an indexer's contents change.
pub const INDEXER_NAME: &str = "Item[]";

/// Member name announced when a collection's size changes.
pub const COUNT_NAME: &str = "Count";

#[derive(Default)]
struct Fields {
    values: RefCell<BTreeMap<Rc<str>, Value>>,
}

impl Fields {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    fn contains(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    /// Store `value`; returns whether the stored value changed.
    fn set(&self, name: &str, value: Value) -> bool {
        let mut values = self.values.borrow_mut();
        match values.get_mut(name) {
            Some(slot) if *slot == value => false,
            Some(slot) => {
                *slot = value;
                true
            }
            None => {
                values.insert(Rc::from(name), value);
                true
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Plain named-field object without change notifications.
pub struct Record {
    type_name: Rc<str>,
    fields: Fields,
}

impl Record {
    #[must_use]
    pub fn new(type_name: impl Into<Rc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Fields::default(),
        }
    }

    #[must_use]
    pub fn with_field(self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.set(name, value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.get(name)
    }

    /// Set or add a field.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.fields.set(name, value.into());
    }
}

impl DataObject for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_member(&self, name: &str) -> Result<Value, EvalError> {
        self.fields
            .get(name)
            .ok_or_else(|| EvalError::member_not_found(&self.type_name, name))
    }

    fn set_member(&self, name: &str, value: Value) -> Result<(), EvalError> {
        if !self.fields.contains(name) {
            return Err(EvalError::member_not_found(&self.type_name, name));
        }
        self.fields.set(name, value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ObservableObject
// ---------------------------------------------------------------------------

/// Named-field object raising property-changed when a field's value changes.
///
/// Setting a field to a value equal to the current one is a no-op: no
/// notification is raised.
pub struct ObservableObject {
    type_name: Rc<str>,
    fields: Fields,
    property_changed: HandlerList,
}

impl ObservableObject {
    #[must_use]
    pub fn new(type_name: impl Into<Rc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Fields::default(),
            property_changed: HandlerList::new(),
        }
    }

    /// Add a field without raising a notification.
    #[must_use]
    pub fn with_field(self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.set(name, value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.get(name)
    }

    /// Set or add a field, raising property-changed if the value changed.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        if self.fields.set(name, value.into()) {
            self.property_changed
                .raise(&ChangeNotice::Property(Rc::from(name)));
        }
    }

    /// Raise property-changed for `name` without touching the field.
    pub fn raise_property_changed(&self, name: &str) {
        self.property_changed
            .raise(&ChangeNotice::Property(Rc::from(name)));
    }

    /// Number of attached property-changed handlers.
    #[must_use]
    pub fn property_subscriber_count(&self) -> usize {
        self.property_changed.len()
    }
}

impl DataObject for ObservableObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_member(&self, name: &str) -> Result<Value, EvalError> {
        self.fields
            .get(name)
            .ok_or_else(|| EvalError::member_not_found(&self.type_name, name))
    }

    fn set_member(&self, name: &str, value: Value) -> Result<(), EvalError> {
        if !self.fields.contains(name) {
            return Err(EvalError::member_not_found(&self.type_name, name));
        }
        self.set(name, value);
        Ok(())
    }

    fn property_notifier(&self) -> Option<&dyn NotifyPropertyChanged> {
        Some(self)
    }
}

impl NotifyPropertyChanged for ObservableObject {
    fn add_property_handler(&self, handler: &ChangeHandler) {
        self.property_changed.add(handler);
    }

    fn remove_property_handler(&self, handler: &ChangeHandler) {
        self.property_changed.remove(handler);
    }
}

// ---------------------------------------------------------------------------
// ArrayObject
// ---------------------------------------------------------------------------

/// Fixed-shape array, optionally multi-dimensional, without notifications.
///
/// Elements are stored row-major. Indexing outside a dimension's bounds is
/// [`EvalError::IndexOutOfRange`].
pub struct ArrayObject {
    shape: Vec<usize>,
    items: RefCell<Vec<Value>>,
}

impl ArrayObject {
    /// One-dimensional array.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            shape: vec![items.len()],
            items: RefCell::new(items),
        }
    }

    /// Array with an explicit shape; `items.len()` must equal the product of
    /// the dimensions.
    pub fn with_shape(shape: Vec<usize>, items: Vec<Value>) -> Result<Self, EvalError> {
        // A shape whose size overflows can never match `items`.
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .unwrap_or(usize::MAX);
        if shape.is_empty() || expected != items.len() {
            return Err(EvalError::ArgumentCount {
                expected,
                found: items.len(),
            });
        }
        Ok(Self {
            shape,
            items: RefCell::new(items),
        })
    }

    /// Two-dimensional array from equally sized rows.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Result<Self, EvalError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let items: Vec<Value> = rows.into_iter().flatten().collect();
        Self::with_shape(vec![height, width], items)
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    fn offset(&self, args: &[Value]) -> Result<usize, EvalError> {
        expect_args(args, self.shape.len())?;
        let mut offset = 0usize;
        for (arg, &dim) in args.iter().zip(&self.shape) {
            let index = int_arg(arg)?;
            let i = usize::try_from(index)
                .ok()
                .filter(|&i| i < dim)
                .ok_or(EvalError::IndexOutOfRange { index, len: dim })?;
            offset = offset * dim + i;
        }
        Ok(offset)
    }
}

impl DataObject for ArrayObject {
    fn type_name(&self) -> &str {
        "Array"
    }

    fn get_member(&self, name: &str) -> Result<Value, EvalError> {
        match name {
            "Length" => Ok(Value::Int(self.len() as i64)),
            "Rank" => Ok(Value::Int(self.rank() as i64)),
            _ => Err(EvalError::member_not_found("Array", name)),
        }
    }

    fn get_index(&self, args: &[Value]) -> Result<Value, EvalError> {
        let offset = self.offset(args)?;
        Ok(self.items.borrow()[offset].clone())
    }

    fn set_index(&self, args: &[Value], value: Value) -> Result<(), EvalError> {
        let offset = self.offset(args)?;
        self.items.borrow_mut()[offset] = value;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ObservableList
// ---------------------------------------------------------------------------

/// Growable sequence raising collection-changed on every mutation and
/// property-changed for `Count` whenever its size changes.
///
/// Indexing outside `0..len` is [`EvalError::ArgumentOutOfRange`].
#[derive(Default)]
pub struct ObservableList {
    items: RefCell<Vec<Value>>,
    collection_changed: HandlerList,
    property_changed: HandlerList,
}

impl ObservableList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            items: RefCell::new(values.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    pub fn push(&self, value: impl Into<Value>) {
        let index = {
            let mut items = self.items.borrow_mut();
            items.push(value.into());
            items.len() - 1
        };
        self.notify(CollectionAction::Add { index }, true);
    }

    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<(), EvalError> {
        {
            let mut items = self.items.borrow_mut();
            if index > items.len() {
                return Err(out_of_range(index, items.len()));
            }
            items.insert(index, value.into());
        }
        self.notify(CollectionAction::Add { index }, true);
        Ok(())
    }

    pub fn remove_at(&self, index: usize) -> Result<Value, EvalError> {
        let removed = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return Err(out_of_range(index, items.len()));
            }
            items.remove(index)
        };
        self.notify(CollectionAction::Remove { index }, true);
        Ok(removed)
    }

    /// Replace the element at `index`, returning the previous one.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<Value, EvalError> {
        let old = {
            let mut items = self.items.borrow_mut();
            let len = items.len();
            let slot = items.get_mut(index).ok_or(out_of_range(index, len))?;
            std::mem::replace(slot, value.into())
        };
        self.notify(CollectionAction::Replace { index }, false);
        Ok(old)
    }

    pub fn move_item(&self, from: usize, to: usize) -> Result<(), EvalError> {
        {
            let mut items = self.items.borrow_mut();
            let len = items.len();
            if from >= len {
                return Err(out_of_range(from, len));
            }
            if to >= len {
                return Err(out_of_range(to, len));
            }
            let item = items.remove(from);
            items.insert(to, item);
        }
        self.notify(CollectionAction::Move { from, to }, false);
        Ok(())
    }

    pub fn clear(&self) {
        let was_empty = {
            let mut items = self.items.borrow_mut();
            let was_empty = items.is_empty();
            items.clear();
            was_empty
        };
        self.notify(CollectionAction::Reset, !was_empty);
    }

    /// Number of attached collection-changed handlers.
    #[must_use]
    pub fn collection_subscriber_count(&self) -> usize {
        self.collection_changed.len()
    }

    /// Number of attached property-changed handlers.
    #[must_use]
    pub fn property_subscriber_count(&self) -> usize {
        self.property_changed.len()
    }

    fn notify(&self, action: CollectionAction, count_changed: bool) {
        self.collection_changed
            .raise(&ChangeNotice::Collection(action));
        if count_changed {
            self.property_changed
                .raise(&ChangeNotice::Property(Rc::from(COUNT_NAME)));
        }
    }

    fn checked_index(&self, args: &[Value]) -> Result<usize, EvalError> {
        let index = index_arg(args)?;
        let len = self.len();
        usize::try_from(index)
            .ok()
            .filter(|&i| i < len)
            .ok_or(EvalError::ArgumentOutOfRange { index, len })
    }
}

fn out_of_range(index: usize, len: usize) -> EvalError {
    EvalError::ArgumentOutOfRange {
        index: i64::try_from(index).unwrap_or(i64::MAX),
        len,
    }
}

impl DataObject for ObservableList {
    fn type_name(&self) -> &str {
        "ObservableList"
    }

    fn get_member(&self, name: &str) -> Result<Value, EvalError> {
        match name {
            COUNT_NAME => Ok(Value::Int(self.len() as i64)),
            _ => Err(EvalError::member_not_found("ObservableList", name)),
        }
    }

    fn get_index(&self, args: &[Value]) -> Result<Value, EvalError> {
        let index = self.checked_index(args)?;
        Ok(self.items.borrow()[index].clone())
    }

    fn set_index(&self, args: &[Value], value: Value) -> Result<(), EvalError> {
        let index = self.checked_index(args)?;
        self.set(index, value).map(drop)
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, EvalError> {
        match method {
            "Get" => self.get_index(args),
            "IndexOf" => {
                expect_args(args, 1)?;
                let position = self.items.borrow().iter().position(|v| *v == args[0]);
                Ok(Value::Int(position.map_or(-1, |p| p as i64)))
            }
            "Contains" => {
                expect_args(args, 1)?;
                Ok(Value::Bool(self.items.borrow().contains(&args[0])))
            }
            _ => Err(EvalError::method_not_found("ObservableList", method)),
        }
    }

    fn property_notifier(&self) -> Option<&dyn NotifyPropertyChanged> {
        Some(self)
    }

    fn collection_notifier(&self) -> Option<&dyn NotifyCollectionChanged> {
        Some(self)
    }
}

impl NotifyPropertyChanged for ObservableList {
    fn add_property_handler(&self, handler: &ChangeHandler) {
        self.property_changed.add(handler);
    }

    fn remove_property_handler(&self, handler: &ChangeHandler) {
        self.property_changed.remove(handler);
    }
}

impl NotifyCollectionChanged for ObservableList {
    fn add_collection_handler(&self, handler: &ChangeHandler) {
        self.collection_changed.add(handler);
    }

    fn remove_collection_handler(&self, handler: &ChangeHandler) {
        self.collection_changed.remove(handler);
    }
}

// ---------------------------------------------------------------------------
// ObservableDictionary
// ---------------------------------------------------------------------------

/// String-keyed map with an indexer, raising property-changed for
/// [`INDEXER_NAME`] when an entry changes and for [`COUNT_NAME`] when its
/// size changes.
#[derive(Default)]
pub struct ObservableDictionary {
    entries: RefCell<BTreeMap<String, Value>>,
    property_changed: HandlerList,
}

impl ObservableDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Insert or replace an entry.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        let (changed, added) = {
            let mut entries = self.entries.borrow_mut();
            match entries.insert(key.into(), value.clone()) {
                Some(old) => (old != value, false),
                None => (true, true),
            }
        };
        if changed {
            self.raise(INDEXER_NAME);
        }
        if added {
            self.raise(COUNT_NAME);
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.entries.borrow_mut().remove(key);
        if removed.is_some() {
            self.raise(INDEXER_NAME);
            self.raise(COUNT_NAME);
        }
        removed
    }

    /// Number of attached property-changed handlers.
    #[must_use]
    pub fn property_subscriber_count(&self) -> usize {
        self.property_changed.len()
    }

    fn raise(&self, name: &str) {
        self.property_changed
            .raise(&ChangeNotice::Property(Rc::from(name)));
    }
}

impl DataObject for ObservableDictionary {
    fn type_name(&self) -> &str {
        "ObservableDictionary"
    }

    fn get_member(&self, name: &str) -> Result<Value, EvalError> {
        match name {
            COUNT_NAME => Ok(Value::Int(self.len() as i64)),
            _ => Err(EvalError::member_not_found("ObservableDictionary", name)),
        }
    }

    fn get_index(&self, args: &[Value]) -> Result<Value, EvalError> {
        let key = key_arg(args)?;
        self.get(key).ok_or_else(|| EvalError::KeyNotFound {
            key: key.to_owned(),
        })
    }

    fn set_index(&self, args: &[Value], value: Value) -> Result<(), EvalError> {
        let key = key_arg(args)?;
        self.insert(key, value);
        Ok(())
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, EvalError> {
        match method {
            "ContainsKey" => {
                let key = key_arg(args)?;
                Ok(Value::Bool(self.entries.borrow().contains_key(key)))
            }
            _ => Err(EvalError::method_not_found("ObservableDictionary", method)),
        }
    }

    fn property_notifier(&self) -> Option<&dyn NotifyPropertyChanged> {
        Some(self)
    }
}

impl NotifyPropertyChanged for ObservableDictionary {
    fn add_property_handler(&self, handler: &ChangeHandler) {
        self.property_changed.add(handler);
    }

    fn remove_property_handler(&self, handler: &ChangeHandler) {
        self.property_changed.remove(handler);
    }
}
