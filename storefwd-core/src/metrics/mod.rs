//! Metrics for store operations
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

pub const OBJECTS_STORED: &str = "store.objects.stored";
pub const OBJECTS_RETRIEVED: &str = "store.objects.retrieved";
pub const OBJECTS_UPDATED: &str = "store.objects.updated";
pub const OBJECTS_REMOVED: &str = "store.objects.removed";
pub const INDEX_PRUNED: &str = "store.index.pruned";
pub const WATCH_RETRIES: &str = "store.watch.retries";
pub const ERRORS: &str = "store.errors";
pub const OPERATION_DURATION: &str = "store.operation.duration_ms";

/// Register metric descriptions
pub fn init_metrics() {
    describe_counter!(OBJECTS_STORED, "Objects written by Store");
    describe_counter!(OBJECTS_RETRIEVED, "Objects returned by Retrieve");
    describe_counter!(OBJECTS_UPDATED, "Objects replaced by Update");
    describe_counter!(OBJECTS_REMOVED, "Objects deleted by Remove");
    describe_counter!(INDEX_PRUNED, "Stale owner index entries removed");
    describe_counter!(WATCH_RETRIES, "Batches retried after a watched key changed");
    describe_counter!(ERRORS, "Failed store operations, labelled by kind");
    describe_histogram!(OPERATION_DURATION, "Store operation duration in milliseconds");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a failed operation
pub fn record_error(operation: &'static str, kind: &'static str) {
    counter!(ERRORS, "operation" => operation, "kind" => kind).increment(1);
}

/// Timer for measuring operation duration
pub struct Timer {
    operation: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(OPERATION_DURATION, "operation" => self.operation)
            .record(duration.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        // no recorder installed: every call is a no-op
        init_metrics();
        record_counter(OBJECTS_STORED, 1);
        record_error("store", "duplicate");
        Timer::new("store").stop();
    }
}
