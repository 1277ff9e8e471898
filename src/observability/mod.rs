//! Observability for the replica lifecycle
//!
//! - Structured JSON logging with a process-wide minimum severity
//! - Typed lifecycle events
//! - Atomic counters and gauges
//! - Begin/complete scopes for multi-step operations
//!
//! # Usage
//!
//! ```ignore
//! use rangedb::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::ReplicaCreated, &[("range_id", "5")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_replicas_created();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::OperationScope;

fn severity_for(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else if event.is_verbose() {
        Severity::Trace
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_for(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}

/// Log a lifecycle event at an explicit severity (refusals, failures)
pub fn log_event_at(severity: Severity, event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity, event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_for_events() {
        assert_eq!(severity_for(Event::CorruptionDetected), Severity::Fatal);
        assert_eq!(severity_for(Event::LookupRetry), Severity::Trace);
        assert_eq!(severity_for(Event::ReplicaCreated), Severity::Info);
    }

    #[test]
    fn test_log_event() {
        log_event(Event::ConfigLoaded);
        log_event_with_fields(Event::ReplicaCreated, &[("range_id", "1")]);
        log_event_at(Severity::Warn, Event::ReplicaCreateRefused, &[]);
    }
}
