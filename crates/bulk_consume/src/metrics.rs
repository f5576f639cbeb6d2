//! Metrics for the range finder and dispatcher, following the teacher's
//! convention of a dedicated `metrics` module per crate with a high-level
//! "this event happened" interface (`metrics/src/metrics.rs`).

use metrics::{
    log_counter,
    log_counter_with_labels,
    register_convex_counter,
    StaticMetricLabel,
};

register_convex_counter!(
    BULK_CONSUME_DISCOVERY_PROBES_TOTAL,
    "Count of seed/count probes issued by the range finder"
);
pub fn log_discovery_probe() {
    log_counter(&BULK_CONSUME_DISCOVERY_PROBES_TOTAL, 1);
}

register_convex_counter!(
    BULK_CONSUME_ACCEPTANCE_BAND_MISSES_TOTAL,
    "Count of count probes whose total fell outside the acceptance band",
    &["verdict"]
);
pub fn log_acceptance_band_miss(verdict: &'static str) {
    log_counter_with_labels(
        &BULK_CONSUME_ACCEPTANCE_BAND_MISSES_TOTAL,
        1,
        vec![StaticMetricLabel::new("verdict", verdict)],
    );
}

register_convex_counter!(
    BULK_CONSUME_TIMER_EXPIRY_TOTAL,
    "Count of range finder early exits triggered by timer expiry"
);
pub fn log_timer_expiry() {
    log_counter(&BULK_CONSUME_TIMER_EXPIRY_TOTAL, 1);
}
