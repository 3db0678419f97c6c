#![no_main]

use std::rc::Rc;

use arbitrary::Arbitrary;
use ftui_binding::{BindingExpression, Expr, ObservableObject, Value, compile};
use libfuzzer_sys::fuzz_target;

const POOL: usize = 4;

#[derive(Arbitrary, Debug)]
enum Mutation {
    SetA(u8),
    SetB(u8, u8),
    SetC(u8, u8),
    Raise(u8),
    Write(u8),
    Resubscribe,
}

fuzz_target!(|input: Vec<Mutation>| {
    let leaves: Vec<_> = (0..POOL)
        .map(|i| Rc::new(ObservableObject::new("Leaf").with_field("C", i as i64)))
        .collect();
    let nodes: Vec<_> = (0..POOL)
        .map(|i| Rc::new(ObservableObject::new("Node").with_field("B", leaves[i].clone())))
        .collect();
    let root = Rc::new(ObservableObject::new("Root").with_field("A", nodes[0].clone()));

    let expr = Expr::root().member("A").member("B").member("C");
    let eval = compile(&expr);
    let binding = BindingExpression::two_way(root.clone(), &expr).expect("assignable path");
    let mut sub = Some(binding.subscribe(|_| {}));

    for mutation in input.into_iter().take(256) {
        match mutation {
            Mutation::SetA(i) => match nodes.get(usize::from(i) % (POOL + 1)) {
                Some(node) => root.set("A", node.clone()),
                None => root.set("A", Value::Null),
            },
            Mutation::SetB(n, l) => {
                let node = &nodes[usize::from(n) % POOL];
                match leaves.get(usize::from(l) % (POOL + 1)) {
                    Some(leaf) => node.set("B", leaf.clone()),
                    None => node.set("B", Value::Null),
                }
            }
            Mutation::SetC(l, v) => leaves[usize::from(l) % POOL].set("C", i64::from(v)),
            Mutation::Raise(i) => {
                root.raise_property_changed(if i % 2 == 0 { "A" } else { "Other" });
            }
            Mutation::Write(v) => {
                binding.write(Value::from(i64::from(v)));
            }
            Mutation::Resubscribe => {
                drop(sub.take());
                sub = Some(binding.subscribe(|_| {}));
            }
        }

        let fresh = eval(&Value::Object(root.clone()));
        let current = binding.current();
        match (current.value(), &fresh) {
            (Ok(published), Ok(expected)) => assert_eq!(published, expected),
            (Err(_), Err(expected)) => {
                assert_eq!(current.error_kind(), Some(expected.kind()));
            }
            (published, expected) => panic!("diverged: {published:?} vs {expected:?}"),
        }
    }

    drop(sub);
    assert_eq!(root.property_subscriber_count(), 0);
    for object in nodes.iter().chain(leaves.iter()) {
        assert_eq!(object.property_subscriber_count(), 0);
    }
});
