//! Warnings emitted by read-only wrappers.
//!
//! Captures tracing events with a small layer and checks that rejected
//! writes are reported with the key and the target id.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use reactivity_core::{readonly, shallow_readonly, Target, Value};

#[derive(Debug, Default, Clone)]
struct Captured {
    level: Option<Level>,
    message: String,
    key: Option<String>,
    target_id: Option<String>,
}

impl Visit for Captured {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        match field.name() {
            "message" => self.message = rendered,
            "key" => self.key = Some(rendered),
            "target_id" => self.target_id = Some(rendered),
            _ => {}
        }
    }
}

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl CaptureLayer {
    fn warnings(&self) -> Vec<Captured> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == Some(Level::WARN))
            .cloned()
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut captured = Captured {
            level: Some(*event.metadata().level()),
            ..Captured::default()
        };
        event.record(&mut captured);
        self.events.lock().unwrap().push(captured);
    }
}

fn capture<R>(f: impl FnOnce() -> R) -> (R, CaptureLayer) {
    let layer = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, layer)
}

#[test]
fn readonly_set_warns_with_key_and_target() {
    let target = Target::from_entries([("title", "draft")]);
    let id = target.id();
    let view = readonly(target.clone());

    let (accepted, layer) = capture(|| view.set("title", "final"));
    assert!(accepted);
    assert_eq!(target.get(&"title".into()), Value::from("draft"));

    let warnings = layer.warnings();
    assert_eq!(warnings.len(), 1);
    let warning = &warnings[0];
    assert_eq!(warning.key.as_deref(), Some("title"));
    assert_eq!(warning.target_id, Some(id.to_string()));
    assert!(warning.message.contains("set operation on key \"title\" failed"));
    assert!(warning.message.contains("is readonly"));
}

#[test]
fn shallow_readonly_delete_warns() {
    let target = Target::from_entries([("a", 1)]);
    let view = shallow_readonly(target.clone());

    let (accepted, layer) = capture(|| view.delete("a"));
    assert!(accepted);
    assert!(target.contains(&"a".into()));

    let warnings = layer.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("delete operation on key \"a\" failed"));
}

#[test]
fn readonly_reads_do_not_warn() {
    let view = readonly(Target::from_entries([("a", 1)]));
    let (value, layer) = capture(|| view.get("a"));
    assert_eq!(value, Value::from(1));
    assert!(layer.warnings().is_empty());
}
