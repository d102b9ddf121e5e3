//! Write-path extension points.
//!
//! Three small callback chains run synchronously, in registration order,
//! around every write: should-log vetoes, pre-log transforms, and
//! post-log notifications. Their contracts differ — a veto returns a
//! boolean, a transform returns the replacement payload, a notification
//! is fire-and-forget.

use crate::engine::entry::{Level, StructuredData};
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

/// Message/context pair flowing through pre-log transforms.
#[derive(Debug, Clone)]
pub struct LogPayload {
    pub message: String,
    pub context: Map<String, Value>,
}

/// Snapshot handed to post-log notifications after persistence.
#[derive(Debug, Clone)]
pub struct PostLogEvent<'a> {
    /// Backend-generated id, `None` for the file backend or failed writes.
    pub id: Option<i64>,
    pub level: Level,
    pub timestamp: &'a str,
    pub message: &'a str,
    pub context: &'a Map<String, Value>,
    pub structured: &'a StructuredData,
}

type ShouldLogFn = dyn Fn(&Map<String, Value>) -> bool + Send + Sync;
type PreLogFn = dyn Fn(LogPayload) -> LogPayload + Send + Sync;
type PostLogFn = dyn Fn(&PostLogEvent<'_>) + Send + Sync;

/// Registry of write-path callbacks. Default: no callbacks, every entry
/// is logged unchanged.
#[derive(Default)]
pub struct HookRegistry {
    should_log: RwLock<Vec<Arc<ShouldLogFn>>>,
    pre_log: RwLock<Vec<Arc<PreLogFn>>>,
    post_log: RwLock<Vec<Arc<PostLogFn>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a veto: returning `false` for a context drops the entry.
    pub fn on_should_log<F>(&self, callback: F)
    where
        F: Fn(&Map<String, Value>) -> bool + Send + Sync + 'static,
    {
        self.should_log
            .write()
            .expect("should_log hooks poisoned")
            .push(Arc::new(callback));
    }

    /// Register a transform over `(message, context)` applied before
    /// persistence.
    pub fn on_pre_log<F>(&self, callback: F)
    where
        F: Fn(LogPayload) -> LogPayload + Send + Sync + 'static,
    {
        self.pre_log
            .write()
            .expect("pre_log hooks poisoned")
            .push(Arc::new(callback));
    }

    /// Register a fire-and-forget notification invoked after persistence.
    pub fn on_post_log<F>(&self, callback: F)
    where
        F: Fn(&PostLogEvent<'_>) + Send + Sync + 'static,
    {
        self.post_log
            .write()
            .expect("post_log hooks poisoned")
            .push(Arc::new(callback));
    }

    /// All vetoes must agree; any `false` suppresses the entry.
    pub(crate) fn should_log(&self, context: &Map<String, Value>) -> bool {
        let callbacks = self.should_log.read().expect("should_log hooks poisoned");
        callbacks.iter().all(|callback| callback(context))
    }

    pub(crate) fn apply_pre_log(&self, payload: LogPayload) -> LogPayload {
        let callbacks = self.pre_log.read().expect("pre_log hooks poisoned");
        callbacks
            .iter()
            .fold(payload, |acc, callback| callback(acc))
    }

    pub(crate) fn notify_post_log(&self, event: &PostLogEvent<'_>) {
        let callbacks = self.post_log.read().expect("post_log hooks poisoned");
        for callback in callbacks.iter() {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_default_registry_allows_everything() {
        let hooks = HookRegistry::new();
        assert!(hooks.should_log(&Map::new()));
    }

    #[test]
    fn test_any_false_veto_wins() {
        let hooks = HookRegistry::new();
        hooks.on_should_log(|_| true);
        hooks.on_should_log(|context| !context.contains_key("skip"));

        assert!(hooks.should_log(&Map::new()));
        assert!(!hooks.should_log(&ctx(json!({"skip": true}))));
    }

    #[test]
    fn test_pre_log_transforms_run_in_registration_order() {
        let hooks = HookRegistry::new();
        hooks.on_pre_log(|mut payload| {
            payload.message.push_str(" one");
            payload
        });
        hooks.on_pre_log(|mut payload| {
            payload.message.push_str(" two");
            payload
        });

        let out = hooks.apply_pre_log(LogPayload {
            message: "base".to_string(),
            context: Map::new(),
        });
        assert_eq!(out.message, "base one two");
    }

    #[test]
    fn test_post_log_notifies_all() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let hooks = HookRegistry::new();
        hooks.on_post_log(|_| {
            CALLS.fetch_add(1, Ordering::SeqCst);
        });
        hooks.on_post_log(|_| {
            CALLS.fetch_add(1, Ordering::SeqCst);
        });

        let context = Map::new();
        let structured = StructuredData::default();
        hooks.notify_post_log(&PostLogEvent {
            id: Some(1),
            level: Level::Info,
            timestamp: "2026-08-06 12:00:00",
            message: "hello",
            context: &context,
            structured: &structured,
        });

        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }
}
