//! Unit tests for log.rs
//!
//! Covers LogSeverity ordering, LogEntry construction, DefaultLogger output paths
//! and the error-building macros.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::prism::{Engine, Error};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "prism::AccelerationStructure".to_string(),
        message: format!("{:?} message", severity),
        file,
        line,
    }
}

struct CapturingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CapturingLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn install_capturing_logger() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CapturingLogger { entries: entries.clone() });
    entries
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug_names() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_with_location() {
    let e = entry(LogSeverity::Error, Some("frame_context.rs"), Some(42));
    assert_eq!(e.file, Some("frame_context.rs"));
    assert_eq!(e.line, Some(42));
    assert_eq!(e.source, "prism::AccelerationStructure");
}

#[test]
fn test_log_entry_clone_keeps_fields() {
    let e1 = entry(LogSeverity::Warn, None, None);
    let e2 = e1.clone();
    assert_eq!(e1.severity, e2.severity);
    assert_eq!(e1.message, e2.message);
    assert_eq!(e1.timestamp, e2.timestamp);
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, None, None));
        logger.log(&entry(severity, Some("shader_table.rs"), Some(7)));
    }
}

#[test]
fn test_default_logger_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
}

// ============================================================================
// ERROR MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let entries = install_capturing_logger();

    let err = crate::engine_err!("prism::test", "submit failed with code {}", -4);

    match err {
        Error::BackendError(msg) => assert_eq!(msg, "submit failed with code -4"),
        other => panic!("unexpected error {:?}", other),
    }
    let logged = entries.lock().unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].severity, LogSeverity::Error);
    assert_eq!(logged[0].source, "prism::test");
    assert!(logged[0].file.is_some());
    assert!(logged[0].line.is_some());
    drop(logged);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    let entries = install_capturing_logger();

    fn failing(bail: bool, reached: &mut bool) -> crate::error::Result<()> {
        if bail {
            crate::engine_bail!("prism::test", "bailing out");
        }
        *reached = true;
        Ok(())
    }

    let mut reached = false;
    assert!(failing(true, &mut reached).is_err());
    assert!(!reached);
    assert_eq!(entries.lock().unwrap().len(), 1);

    assert!(failing(false, &mut reached).is_ok());
    assert!(reached);
    assert_eq!(entries.lock().unwrap().len(), 1);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_warn_err_logs_at_warn_severity() {
    let entries = install_capturing_logger();

    fn fallback() -> crate::error::Result<u32> {
        crate::engine_bail_warn!("prism::test", "validation layer missing");
    }

    assert!(matches!(fallback(), Err(Error::BackendError(_))));
    let logged = entries.lock().unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].severity, LogSeverity::Warn);
    assert!(logged[0].file.is_none());
    drop(logged);

    Engine::reset_logger();
}
