//! Diagnostics emitted through `tracing` while a binding runs.

use std::rc::Rc;
use std::sync::{Arc, Mutex};

use ftui_binding::{BindingExpression, Expr, ObservableObject, Value};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Default)]
struct Captured {
    messages: Vec<String>,
}

struct Capture {
    state: Arc<Mutex<Captured>>,
}

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg {
            message: Option<String>,
        }
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg { message: None };
        event.record(&mut msg);
        if let Some(message) = msg.message {
            self.state
                .lock()
                .expect("capture lock")
                .messages
                .push(message);
        }
    }
}

fn capture() -> (Arc<Mutex<Captured>>, tracing::subscriber::DefaultGuard) {
    let state = Arc::new(Mutex::new(Captured::default()));
    let subscriber = tracing_subscriber::registry().with(Capture {
        state: Arc::clone(&state),
    });
    let guard = tracing::subscriber::set_default(subscriber);
    (state, guard)
}

#[test]
fn lifecycle_events_are_emitted() {
    let (state, _guard) = capture();

    let root = Rc::new(ObservableObject::new("Root").with_field("Foo", "a"));
    let binding = BindingExpression::one_way(root.clone(), &Expr::root().member("Foo")).unwrap();
    let sub = binding.subscribe(|_| {});
    root.set("Foo", "b");
    drop(sub);

    let captured = state.lock().expect("capture lock");
    for expected in [
        "binding initialize",
        "binding root changed",
        "chain changed",
        "binding deinitialize",
    ] {
        assert!(
            captured.messages.iter().any(|m| m == expected),
            "missing {expected:?} in {:?}",
            captured.messages
        );
    }
}

#[test]
fn broken_chain_and_failed_write_are_reported() {
    let (state, _guard) = capture();

    let root = Rc::new(ObservableObject::new("Root").with_field("Foo", Value::Null));
    let path = Expr::root().member("Foo").member("Bar").member("Baz");
    let binding = BindingExpression::two_way(root.clone(), &path).unwrap();
    let _sub = binding.subscribe(|_| {});
    assert!(!binding.write(Value::from("x")));

    let captured = state.lock().expect("capture lock");
    assert!(captured.messages.iter().any(|m| m == "access chain broken"));
    assert!(captured.messages.iter().any(|m| m == "write-back failed"));
}
