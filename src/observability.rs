use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// A structured audit record for a user-visible decision: an authorization
/// denial, a listing redirect, an endpoint synthesis. Events are facts about
/// the request, not error logs.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub name: String,
    pub request_id: String,
    pub occurred_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_id: request_id.into(),
            occurred_at: Utc::now(),
            user_id: None,
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        tracing::info!(
            target: "portside.audit",
            event = event.name.as_str(),
            request_id = event.request_id.as_str(),
            user_id = event.user_id.as_deref().unwrap_or(""),
            attributes = ?event.attributes,
            "audit",
        );
    }
}

/// Captures audit events for assertions in tests.
#[derive(Clone, Default)]
pub struct RecordingAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl RecordingAuditSink {
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[derive(Clone)]
pub struct Observability {
    sink: Arc<dyn AuditSink>,
    counters: Arc<Mutex<HashMap<String, u64>>>,
}

impl Default for Observability {
    fn default() -> Self {
        Self::with_sink(Arc::new(TracingAuditSink))
    }
}

impl Observability {
    #[must_use]
    pub fn with_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            counters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn audit(&self, event: AuditEvent) {
        self.sink.record(&event);
    }

    pub fn increment_counter(&self, name: &str, request_id: &str) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name.to_string()).or_insert(0) += 1;
        }
        tracing::debug!(
            target: "portside.metrics",
            counter = name,
            request_id,
            "counter incremented",
        );
    }

    #[must_use]
    pub fn counter_value(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .ok()
            .and_then(|counters| counters.get(name).copied())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_captures_events_in_order() {
        let sink = RecordingAuditSink::default();
        let observability = Observability::with_sink(Arc::new(sink.clone()));

        observability.audit(
            AuditEvent::new("project.authorize.denied", "req-1")
                .with_user_id("user_a")
                .with_attribute("project_id", "proj_1"),
        );
        observability.audit(AuditEvent::new("projects.list.redirected", "req-2"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "project.authorize.denied");
        assert_eq!(events[0].user_id.as_deref(), Some("user_a"));
        assert_eq!(events[1].name, "projects.list.redirected");
    }

    #[test]
    fn counters_accumulate_per_name() {
        let observability = Observability::default();

        observability.increment_counter("endpoint.synthesized", "req-1");
        observability.increment_counter("endpoint.synthesized", "req-2");

        assert_eq!(observability.counter_value("endpoint.synthesized"), 2);
        assert_eq!(observability.counter_value("endpoint.persisted"), 0);
    }
}
