//! Prometheus metrics registry for the command-line front-end.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};

use artvault_core::{MuseumTag, StatusSummary};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Download items by museum and status, sampled after a command.
pub static ITEMS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("artvault_items", "Download items by museum and status"),
        &["museum", "status"],
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(ITEMS_BY_STATUS.clone()))
        .unwrap();

    for metric in artvault_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Record the store counts for a museum.
pub fn record_status(museum: MuseumTag, summary: &StatusSummary) {
    let label = museum.as_str();
    for (status, count) in [
        ("pending", summary.pending),
        ("in_progress", summary.in_progress),
        ("complete", summary.complete),
        ("failed", summary.failed),
    ] {
        ITEMS_BY_STATUS
            .with_label_values(&[label, status])
            .set(count as i64);
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
