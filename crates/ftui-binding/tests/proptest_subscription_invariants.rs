//! Property-based invariant tests for binding chain maintenance.
//!
//! Drives a three-level object graph (`Root.A.B.C`) through arbitrary
//! mutation sequences and verifies after every step:
//!
//! 1. The last published result equals a fresh evaluation of the path
//! 2. Exactly the objects currently on the path carry one handler each
//! 3. No other object carries a handler
//! 4. After the last observer leaves, no object carries a handler
//!
//! Both link cache policies are exercised.

use std::rc::Rc;

use ftui_binding::{
    BindingConfig, BindingExpression, BindingValue, DataObject, EvalError, Expr, LinkCachePolicy,
    ObjectRef, ObservableObject, SingleRoot, Value, compile, same_object,
};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────

const NODES: usize = 3;
const LEAVES: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    /// Point `Root.A` at node `i`, or null when `i == NODES`.
    SetA(usize),
    /// Point `node.B` at leaf `j`, or null when `j == LEAVES`.
    SetB(usize, usize),
    SetC(usize, u8),
    RaiseRoot,
    RaiseNode(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..=NODES).prop_map(Op::SetA),
        (0..NODES, 0..=LEAVES).prop_map(|(n, l)| Op::SetB(n, l)),
        (0..LEAVES, 0u8..4).prop_map(|(l, v)| Op::SetC(l, v)),
        Just(Op::RaiseRoot),
        (0..NODES).prop_map(Op::RaiseNode),
    ]
}

fn arb_policy() -> impl Strategy<Value = LinkCachePolicy> {
    prop_oneof![
        Just(LinkCachePolicy::AdvanceOnChange),
        Just(LinkCachePolicy::AdvanceOnSubscribe),
    ]
}

struct Graph {
    root: Rc<ObservableObject>,
    nodes: Vec<Rc<ObservableObject>>,
    leaves: Vec<Rc<ObservableObject>>,
}

impl Graph {
    fn new() -> Self {
        let leaves: Vec<_> = (0..LEAVES)
            .map(|i| Rc::new(ObservableObject::new("Leaf").with_field("C", format!("c{i}"))))
            .collect();
        let nodes: Vec<_> = (0..NODES)
            .map(|i| {
                Rc::new(ObservableObject::new("Node").with_field("B", leaves[i % LEAVES].clone()))
            })
            .collect();
        let root = Rc::new(ObservableObject::new("Root").with_field("A", nodes[0].clone()));
        Self {
            root,
            nodes,
            leaves,
        }
    }

    fn apply(&self, op: &Op) {
        match *op {
            Op::SetA(i) => match self.nodes.get(i) {
                Some(node) => self.root.set("A", node.clone()),
                None => self.root.set("A", Value::Null),
            },
            Op::SetB(n, l) => match self.leaves.get(l) {
                Some(leaf) => self.nodes[n].set("B", leaf.clone()),
                None => self.nodes[n].set("B", Value::Null),
            },
            Op::SetC(l, v) => self.leaves[l].set("C", format!("v{v}")),
            Op::RaiseRoot => self.root.raise_property_changed("A"),
            Op::RaiseNode(n) => self.nodes[n].raise_property_changed("B"),
        }
    }

    fn is_on_path(&self, object: &Rc<ObservableObject>, path: &[ObjectRef]) -> bool {
        let object: ObjectRef = object.clone();
        path.iter().any(|p| same_object(p, &object))
    }

    /// Objects the binding must currently watch: the root, `Root.A` and
    /// `Root.A.B` when they are objects.
    fn watched(&self) -> Vec<ObjectRef> {
        let root: ObjectRef = self.root.clone();
        let mut path = vec![root];
        if let Some(Value::Object(node)) = self.root.get("A") {
            path.push(node.clone());
            if let Ok(Value::Object(leaf)) = node.get_member("B") {
                path.push(leaf);
            }
        }
        path
    }

    fn all(&self) -> impl Iterator<Item = &Rc<ObservableObject>> {
        std::iter::once(&self.root)
            .chain(self.nodes.iter())
            .chain(self.leaves.iter())
    }
}

fn path() -> Expr {
    Expr::root().member("A").member("B").member("C")
}

fn same_outcome(published: &BindingValue<Value>, fresh: &Result<Value, EvalError>) -> bool {
    match (published, fresh) {
        (BindingValue::Value(a), Ok(b)) => a == b,
        (BindingValue::Error(a), Err(b)) => a.kind() == b.kind(),
        _ => false,
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1-3. Published value and handler placement track the graph
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn chain_tracks_arbitrary_mutations(
        policy in arb_policy(),
        ops in proptest::collection::vec(arb_op(), 0..=40),
    ) {
        let graph = Graph::new();
        let root: ObjectRef = graph.root.clone();
        let expr = path();
        let eval = compile(&expr);
        let binding = BindingExpression::new(
            Rc::new(SingleRoot::new(&root)),
            &expr,
            compile(&expr),
            None,
            BindingConfig::default().with_link_cache(policy),
        )
        .unwrap();
        let _sub = binding.subscribe(|_| {});

        for op in &ops {
            graph.apply(op);

            let fresh = eval(&Value::Object(root.clone()));
            prop_assert!(
                same_outcome(&binding.current(), &fresh),
                "after {:?}: published {:?}, fresh {:?}",
                op,
                binding.current(),
                fresh
            );

            let watched = graph.watched();
            for object in graph.all() {
                let expected = usize::from(graph.is_on_path(object, &watched));
                prop_assert_eq!(object.property_subscriber_count(), expected);
            }
            prop_assert_eq!(binding.subscribed_link_count(), watched.len());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Teardown releases every handler
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn teardown_releases_everything(
        policy in arb_policy(),
        ops in proptest::collection::vec(arb_op(), 0..=40),
        observers in 1usize..4,
    ) {
        let graph = Graph::new();
        let root: ObjectRef = graph.root.clone();
        let expr = path();
        let binding = BindingExpression::new(
            Rc::new(SingleRoot::new(&root)),
            &expr,
            compile(&expr),
            None,
            BindingConfig::default().with_link_cache(policy),
        )
        .unwrap();

        let subs: Vec<_> = (0..observers).map(|_| binding.subscribe(|_| {})).collect();
        for op in &ops {
            graph.apply(op);
        }
        drop(subs);

        for object in graph.all() {
            prop_assert_eq!(object.property_subscriber_count(), 0);
        }
        prop_assert!(!binding.is_active());
        prop_assert!(binding.current().is_unset());
    }
}
