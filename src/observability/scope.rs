//! Begin/complete logging around multi-step operations
//!
//! - `{name}_BEGIN` on creation
//! - `{name}_COMPLETE` with `elapsed_us` on `complete()`
//! - `{name}_FAILED` on `fail()`
//! - `{name}_INCOMPLETE` at WARN if dropped without either

use std::time::Instant;

use super::logger::{Logger, Severity};

/// Logs the lifetime of one multi-step operation (node open, snapshot apply).
pub struct OperationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    finished: bool,
}

impl OperationScope {
    /// Start a scope with context fields repeated on every line it emits.
    pub fn begin(name: &'static str, fields: Vec<(&'static str, String)>) -> Self {
        let scope = Self {
            name,
            fields,
            started: Instant::now(),
            finished: false,
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    /// Mark success; extra fields are appended to the context fields.
    pub fn complete(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.started.elapsed().as_micros().to_string();
        let mut fields: Vec<(&str, &str)> = extra.to_vec();
        fields.push(("elapsed_us", elapsed.as_str()));
        self.emit(Severity::Info, "COMPLETE", &fields);
    }

    /// Mark failure at ERROR, or FATAL when `fatal` is set.
    pub fn fail(mut self, reason: &str, fatal: bool) {
        self.finished = true;
        let severity = if fatal { Severity::Fatal } else { Severity::Error };
        self.emit(severity, "FAILED", &[("reason", reason)]);
    }

    /// Microseconds since the scope began.
    pub fn elapsed_us(&self) -> u128 {
        self.started.elapsed().as_micros()
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        if !Logger::enabled(severity) {
            return;
        }
        let event = format!("{}_{}", self.name, suffix);
        let mut fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.extend_from_slice(extra);
        Logger::log(severity, &event, &fields);
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        if !self.finished {
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_complete() {
        let scope = OperationScope::begin("TEST", vec![("range_id", "7".to_string())]);
        scope.complete(&[("result", "ok")]);
    }

    #[test]
    fn test_scope_fail() {
        let scope = OperationScope::begin("TEST", Vec::new());
        scope.fail("boom", false);
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let scope = OperationScope::begin("TEST", Vec::new());
        drop(scope);
    }

    #[test]
    fn test_elapsed_advances() {
        let scope = OperationScope::begin("TEST", Vec::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(scope.elapsed_us() >= 2_000);
        scope.complete(&[]);
    }
}
