//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (completed and failed items, scheduled retries, item duration)
//! - Museum APIs (requests by operation and outcome)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Orchestrator - Item Metrics
// =============================================================================

/// Items downloaded and recorded complete.
pub static ITEMS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "artvault_items_completed_total",
            "Total artworks downloaded successfully",
        ),
        &["museum"],
    )
    .unwrap()
});

/// Items moved to the failed state, by error kind.
pub static ITEMS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "artvault_items_failed_total",
            "Total artworks abandoned after a permanent failure",
        ),
        &["museum", "kind"],
    )
    .unwrap()
});

/// Retries scheduled after a recoverable failure.
pub static RETRIES_SCHEDULED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "artvault_retries_scheduled_total",
            "Total item retries scheduled",
        ),
        &["museum"],
    )
    .unwrap()
});

/// Wall time spent on one item, including rate-limit waits.
pub static ITEM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "artvault_item_duration_seconds",
            "Duration of a single artwork download attempt",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["museum", "result"], // "complete", "retry", "failed"
    )
    .unwrap()
});

// =============================================================================
// Museum APIs
// =============================================================================

/// Requests issued to museum APIs.
pub static MUSEUM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "artvault_museum_requests_total",
            "Total requests to museum APIs",
        ),
        &["museum", "operation", "status"], // status: HTTP code, "timeout", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Items
        Box::new(ITEMS_COMPLETED.clone()),
        Box::new(ITEMS_FAILED.clone()),
        Box::new(RETRIES_SCHEDULED.clone()),
        Box::new(ITEM_DURATION.clone()),
        // Museum APIs
        Box::new(MUSEUM_REQUESTS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register_once() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        ITEMS_COMPLETED.with_label_values(&["aic"]).inc();
        MUSEUM_REQUESTS
            .with_label_values(&["aic", "metadata", "200"])
            .inc();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"artvault_items_completed_total".to_string()));
        assert!(names.contains(&"artvault_museum_requests_total".to_string()));
    }
}
