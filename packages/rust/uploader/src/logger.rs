//! Sinks for non-fatal per-row warnings.

use std::sync::Mutex;

use tracing::warn;

/// Receives warnings raised while mapping a row, such as an unresolved slug.
pub trait RowLogger {
    fn warn(&self, line_number: usize, message: &str);
}

impl<T: RowLogger + ?Sized> RowLogger for &T {
    fn warn(&self, line_number: usize, message: &str) {
        (**self).warn(line_number, message);
    }
}

/// Forwards warnings to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRowLogger;

impl RowLogger for TracingRowLogger {
    fn warn(&self, line_number: usize, message: &str) {
        warn!(line = line_number, "{message}");
    }
}

/// A warning kept by [`RecordingRowLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWarning {
    pub line_number: usize,
    pub message: String,
}

/// Keeps warnings in memory and forwards them to `tracing`.
#[derive(Debug, Default)]
pub struct RecordingRowLogger {
    warnings: Mutex<Vec<RowWarning>>,
}

impl RecordingRowLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded warnings.
    pub fn take(&self) -> Vec<RowWarning> {
        match self.warnings.lock() {
            Ok(mut warnings) => std::mem::take(&mut *warnings),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RowLogger for RecordingRowLogger {
    fn warn(&self, line_number: usize, message: &str) {
        TracingRowLogger.warn(line_number, message);
        let warning = RowWarning {
            line_number,
            message: message.to_string(),
        };
        match self.warnings.lock() {
            Ok(mut warnings) => warnings.push(warning),
            Err(poisoned) => poisoned.into_inner().push(warning),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_keeps_order_and_drains() {
        let logger = RecordingRowLogger::new();
        logger.warn(2, "unknown topic 'tax'");
        (&logger).warn(3, "unknown organisation 'hmrc'");
        assert_eq!(logger.len(), 2);

        let warnings = logger.take();
        assert_eq!(warnings[0].line_number, 2);
        assert_eq!(warnings[1].message, "unknown organisation 'hmrc'");
        assert!(logger.is_empty());
    }
}
