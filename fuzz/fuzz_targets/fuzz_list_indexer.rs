#![no_main]

use std::rc::Rc;

use arbitrary::Arbitrary;
use ftui_binding::{BindingExpression, Expr, ObservableList, ObservableObject};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum ListOp {
    Push(i8),
    Insert(u8, i8),
    RemoveAt(u8),
    Set(u8, i8),
    Move(u8, u8),
    Clear,
}

#[derive(Arbitrary, Debug)]
struct Input {
    index: u8,
    ops: Vec<ListOp>,
}

fuzz_target!(|input: Input| {
    let list = Rc::new(ObservableList::from_values([0i64, 1, 2]));
    let root = Rc::new(ObservableObject::new("Root").with_field("Items", list.clone()));
    let index = i64::from(input.index % 8);
    let binding = BindingExpression::one_way(root, &Expr::root().member("Items").index([index]))
        .expect("valid path");
    let sub = binding.subscribe(|_| {});

    for op in input.ops.into_iter().take(256) {
        let len = list.len();
        let _ = match op {
            ListOp::Push(v) => {
                list.push(i64::from(v));
                Ok(())
            }
            ListOp::Insert(i, v) => list.insert(usize::from(i) % (len + 1), i64::from(v)),
            ListOp::RemoveAt(i) => list.remove_at(usize::from(i)).map(drop),
            ListOp::Set(i, v) => list.set(usize::from(i), i64::from(v)).map(drop),
            ListOp::Move(a, b) => list.move_item(usize::from(a), usize::from(b)),
            ListOp::Clear => {
                list.clear();
                Ok(())
            }
        };

        let expected = usize::try_from(index).ok().and_then(|i| list.get(i));
        match expected {
            Some(value) => assert_eq!(binding.current().value().ok(), Some(&value)),
            None => assert!(binding.current().is_error()),
        }
    }

    drop(sub);
    assert_eq!(list.collection_subscriber_count(), 0);
    assert_eq!(list.property_subscriber_count(), 0);
});
