use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by a session's read loop
///
/// All counters are monotonic for the lifetime of the session and survive
/// reconnects.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Records read off the socket
    pub lines_read: AtomicU64,
    /// Records handed to the decoder (only classes with subscribers)
    pub reports_decoded: AtomicU64,
    /// Callback invocations
    pub reports_delivered: AtomicU64,
    /// Records whose class could not be determined
    pub classify_failures: AtomicU64,
    /// Records of a subscribed class that failed to decode
    pub decode_failures: AtomicU64,
    /// Streams that ended with an unexpected I/O error
    pub stream_errors: AtomicU64,
    /// Successful reconnects
    pub reconnects: AtomicU64,
    /// Reconnect attempts that failed
    pub reconnect_failures: AtomicU64,
}

impl SessionMetrics {
    #[inline]
    pub(crate) fn line_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn report_decoded(&self) {
        self.reports_decoded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn reports_delivered(&self, count: usize) {
        self.reports_delivered
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn classify_failure(&self) {
        self.classify_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn stream_error(&self) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn reconnected(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn reconnect_failed(&self) {
        self.reconnect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            reports_decoded: self.reports_decoded.load(Ordering::Relaxed),
            reports_delivered: self.reports_delivered.load(Ordering::Relaxed),
            classify_failures: self.classify_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            stream_errors: self.stream_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            reconnect_failures: self.reconnect_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetricsSnapshot {
    pub lines_read: u64,
    pub reports_decoded: u64,
    pub reports_delivered: u64,
    pub classify_failures: u64,
    pub decode_failures: u64,
    pub stream_errors: u64,
    pub reconnects: u64,
    pub reconnect_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = SessionMetrics::default();
        assert_eq!(metrics.snapshot(), SessionMetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = SessionMetrics::default();

        metrics.line_read();
        metrics.line_read();
        metrics.report_decoded();
        metrics.reports_delivered(3);
        metrics.classify_failure();
        metrics.decode_failure();
        metrics.stream_error();
        metrics.reconnected();
        metrics.reconnect_failed();
        metrics.reconnect_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.lines_read, 2);
        assert_eq!(snapshot.reports_decoded, 1);
        assert_eq!(snapshot.reports_delivered, 3);
        assert_eq!(snapshot.classify_failures, 1);
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.stream_errors, 1);
        assert_eq!(snapshot.reconnects, 1);
        assert_eq!(snapshot.reconnect_failures, 2);
    }
}
