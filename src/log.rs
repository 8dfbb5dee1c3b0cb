//! The dispatcher: validates severity labels, stamps entries, and fans
//! them out to every registered transport.
//!
//! Fan-out discipline: the writes of one `log` call run concurrently and
//! the call resolves once every transport settled. A caller issuing `log`
//! calls one after another therefore has each transport observe its
//! entries in issue order, while within a single call a slow transport
//! never delays its siblings. Transport failures are reported to the
//! diagnostic channel and never raised to the caller.

use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::domain::{Entry, Level};
use crate::error::LogError;
use crate::transport::Transport;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub struct Log {
    transports: RwLock<Vec<Arc<dyn Transport>>>,
    timers: Mutex<HashMap<String, Instant>>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Log {
    #[must_use]
    pub fn new() -> Self {
        Self::with_diagnostics(Arc::new(TracingDiagnostics))
    }

    #[must_use]
    pub fn with_diagnostics(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            transports: RwLock::new(Vec::new()),
            timers: Mutex::new(HashMap::new()),
            diagnostics,
        }
    }

    /// Appends to the fan-out order. Nothing is validated here; a
    /// misbehaving transport surfaces on its first write.
    pub fn add_transport(&self, transport: Arc<dyn Transport>) {
        self.transports.write().push(transport);
    }

    /// Removes every transport named `name`; a no-op when none match.
    pub fn remove_transport_by_name(&self, name: &str) {
        self.transports
            .write()
            .retain(|transport| transport.name() != name);
    }

    /// Logs one entry. Fails fast on an unknown severity name; transport
    /// failures are fire-and-forget from the caller's point of view.
    pub async fn log(
        &self,
        level: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> Result<(), LogError> {
        let level: Level = level.parse()?;
        self.dispatch(level, message, meta).await;
        Ok(())
    }

    pub async fn info(&self, message: &str, meta: Option<serde_json::Value>) {
        self.dispatch(Level::Info, message, meta).await;
    }

    pub async fn warn(&self, message: &str, meta: Option<serde_json::Value>) {
        self.dispatch(Level::Warn, message, meta).await;
    }

    pub async fn error(&self, message: &str, meta: Option<serde_json::Value>) {
        self.dispatch(Level::Error, message, meta).await;
    }

    pub async fn debug(&self, message: &str, meta: Option<serde_json::Value>) {
        self.dispatch(Level::Debug, message, meta).await;
    }

    /// Starts (or restarts) a named timer.
    pub fn time(&self, label: impl Into<String>) {
        self.timers.lock().insert(label.into(), Instant::now());
    }

    /// Stops a named timer and logs the elapsed milliseconds at info;
    /// warns when no such timer is running. The label is consumed.
    pub async fn time_end(&self, label: &str) {
        let started = self.timers.lock().remove(label);
        match started {
            Some(started) => {
                let ms = started.elapsed().as_secs_f64() * 1e3;
                self.dispatch(Level::Info, &format!("{label}: {ms:.3}ms"), None)
                    .await;
            }
            None => {
                self.dispatch(Level::Warn, &format!("No such timer: {label}"), None)
                    .await;
            }
        }
    }

    async fn dispatch(&self, level: Level, message: &str, meta: Option<serde_json::Value>) {
        let entry = Entry::new(level, message, meta);

        // Snapshot so registration changes never invalidate the fan-out
        // in flight.
        let targets: Vec<Arc<dyn Transport>> = self.transports.read().clone();
        let writes = targets.iter().map(|transport| transport.write(entry.clone()));
        let results = futures::future::join_all(writes).await;

        for (transport, result) in targets.iter().zip(results) {
            if let Err(err) = result {
                self.diagnostics.report(DiagnosticEvent::WriteFailed {
                    transport: transport.name().to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingDiagnostics, RecordingTransport};
    use crate::transport::console::{ConsoleOptions, ConsoleTransport};
    use crate::transport::file::{FileOptions, FileTransport};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unknown_level_fails_fast_and_delivers_nothing() {
        let log = Log::new();
        let transport = RecordingTransport::new("first", Level::Debug);
        log.add_transport(transport.clone());

        let err = log.log("fatal", "kaboom", None).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown log level: fatal");
        assert!(transport.entries().is_empty());
    }

    #[tokio::test]
    async fn test_entry_is_delivered_to_every_registered_transport() {
        let log = Log::new();
        let first = RecordingTransport::new("first", Level::Debug);
        let second = RecordingTransport::new("second", Level::Debug);
        log.add_transport(first.clone());
        log.add_transport(second.clone());

        log.log("info", "hello", Some(json!({"k": 1}))).await.unwrap();

        for transport in [&first, &second] {
            let entries = transport.entries();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].message, "hello");
            assert_eq!(entries[0].level, Level::Info);
            assert_eq!(entries[0].meta, Some(json!({"k": 1})));
        }
    }

    #[tokio::test]
    async fn test_sequential_calls_are_observed_in_issue_order() {
        let log = Log::new();
        let transport = RecordingTransport::new("only", Level::Debug);
        log.add_transport(transport.clone());

        for i in 0..5 {
            log.log("info", &format!("message {i}"), None).await.unwrap();
        }

        let messages: Vec<String> = transport
            .entries()
            .into_iter()
            .map(|entry| entry.message)
            .collect();
        assert_eq!(
            messages,
            (0..5).map(|i| format!("message {i}")).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_delivery_respects_each_transports_minimum() {
        let log = Log::new();
        let strict = RecordingTransport::new("strict", Level::Error);
        let lax = RecordingTransport::new("lax", Level::Debug);
        log.add_transport(strict.clone());
        log.add_transport(lax.clone());

        log.log("warn", "watch out", None).await.unwrap();

        assert!(strict.entries().is_empty());
        assert_eq!(lax.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_removal_by_name_prunes_every_match() {
        let log = Log::new();
        let first = RecordingTransport::new("dup", Level::Debug);
        let second = RecordingTransport::new("dup", Level::Debug);
        let keeper = RecordingTransport::new("keeper", Level::Debug);
        log.add_transport(first.clone());
        log.add_transport(second.clone());
        log.add_transport(keeper.clone());

        log.log("info", "before", None).await.unwrap();
        log.remove_transport_by_name("dup");
        log.log("info", "after", None).await.unwrap();

        assert_eq!(first.entries().len(), 1);
        assert_eq!(second.entries().len(), 1);
        assert_eq!(keeper.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_removing_an_unknown_name_is_a_no_op() {
        let log = Log::new();
        let transport = RecordingTransport::new("only", Level::Debug);
        log.add_transport(transport.clone());

        log.remove_transport_by_name("missing");
        log.log("info", "still here", None).await.unwrap();
        assert_eq!(transport.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_transport_does_not_stop_siblings() {
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let log = Log::with_diagnostics(diagnostics.clone());
        let failing = RecordingTransport::new("failing", Level::Debug);
        failing.set_should_fail(true);
        let succeeding = RecordingTransport::new("succeeding", Level::Debug);
        log.add_transport(failing);
        log.add_transport(succeeding.clone());

        log.log("error", "important", None).await.unwrap();

        assert_eq!(succeeding.entries().len(), 1);
        let failures: Vec<String> = diagnostics
            .events()
            .into_iter()
            .filter_map(|event| match event {
                DiagnosticEvent::WriteFailed { transport, .. } => Some(transport),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec!["failing".to_string()]);
    }

    #[tokio::test]
    async fn test_convenience_wrappers_fix_the_level() {
        let log = Log::new();
        let transport = RecordingTransport::new("only", Level::Debug);
        log.add_transport(transport.clone());

        log.error("e", None).await;
        log.warn("w", None).await;
        log.info("i", None).await;
        log.debug("d", None).await;

        let levels: Vec<Level> = transport
            .entries()
            .into_iter()
            .map(|entry| entry.level)
            .collect();
        assert_eq!(
            levels,
            vec![Level::Error, Level::Warn, Level::Info, Level::Debug]
        );
    }

    #[tokio::test]
    async fn test_time_end_logs_elapsed_milliseconds_at_info() {
        let log = Log::new();
        let transport = RecordingTransport::new("only", Level::Debug);
        log.add_transport(transport.clone());

        log.time("startup");
        log.time_end("startup").await;

        let entries = transport.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, Level::Info);
        assert!(entries[0].message.starts_with("startup: "));
        assert!(entries[0].message.ends_with("ms"));
    }

    #[tokio::test]
    async fn test_time_end_consumes_the_label() {
        let log = Log::new();
        let transport = RecordingTransport::new("only", Level::Debug);
        log.add_transport(transport.clone());

        log.time("once");
        log.time_end("once").await;
        log.time_end("once").await;

        let entries = transport.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].level, Level::Warn);
        assert_eq!(entries[1].message, "No such timer: once");
    }

    #[tokio::test]
    async fn test_unknown_timer_warns_through_the_pipeline() {
        let log = Log::new();
        let transport = RecordingTransport::new("only", Level::Debug);
        log.add_transport(transport.clone());

        log.time_end("never started").await;

        let entries = transport.entries();
        assert_eq!(entries[0].level, Level::Warn);
        assert_eq!(entries[0].message, "No such timer: never started");
    }

    // The end-to-end scenario: a warn-gated console next to a debug-gated
    // file, fed one debug entry.
    #[tokio::test]
    async fn test_console_stays_silent_while_file_records_debug_entry() {
        let dir = TempDir::new().unwrap();
        let log = Log::new();

        let (console, console_lines) = ConsoleTransport::captured(ConsoleOptions {
            level: Level::Warn,
        });
        log.add_transport(Arc::new(console));

        let mut file_options = FileOptions::new(dir.path());
        file_options.level = Level::Debug;
        log.add_transport(Arc::new(FileTransport::new(file_options).unwrap()));

        log.log("debug", "x", None).await.unwrap();

        assert!(console_lines.lock().unwrap().is_empty());

        let path = dir
            .path()
            .join(format!("{}.log", chrono::Utc::now().date_naive()));
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let record: Entry = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(record.level, Level::Debug);
        assert_eq!(record.message, "x");
    }
}
