//! Prometheus metrics for the exit pipeline and suppression engine

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};

// ── Exit pipeline ────────────────────────────────────────────────────────────

pub static EXIT_DROPPED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "syscap_exit_dropped_total",
        "Syscall exit events dropped before dispatch",
        &["reason"]
    )
    .unwrap()
});

pub static EXIT_DISPATCHED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "syscap_exit_dispatched_total",
        "Syscall exit events handed to a handler"
    )
    .unwrap()
});

// ── Suppression ──────────────────────────────────────────────────────────────

pub static SUPPRESSED_EVENTS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "syscap_suppressed_events_total",
        "Events dropped by the suppression engine"
    )
    .unwrap()
});

pub static SUPPRESSED_TIDS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("syscap_suppressed_tids", "Thread ids currently suppressed").unwrap()
});

pub static SUPPRESS_CACHE: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "syscap_suppress_cache_total",
        "Devid cache lookups by outcome",
        &["result"]
    )
    .unwrap()
});

/// Render all registered metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_registered_metrics() {
        EXIT_DROPPED.with_label_values(&["sampled_out"]).inc();
        SUPPRESSED_TIDS.set(2.0);

        let text = encode_metrics();
        assert!(text.contains("syscap_exit_dropped_total"));
        assert!(text.contains("reason=\"sampled_out\""));
        assert!(text.contains("syscap_suppressed_tids"));
    }
}
