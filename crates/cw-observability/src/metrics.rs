//! Metric family registration.
//!
//! Counters and gauges are emitted at the point of use with the
//! `metrics` macros; this module registers their descriptions so an
//! exporter can surface them with help text.

use metrics::{describe_counter, describe_gauge, Unit};

/// Registers descriptions for every metric family Crosswatch emits.
///
/// Safe to call more than once.
pub fn register_metrics() {
    describe_counter!(
        "crosswatch_events_received_total",
        Unit::Count,
        "Envelopes accepted at the ingestion boundary"
    );
    describe_counter!(
        "crosswatch_events_rejected_total",
        Unit::Count,
        "Envelopes rejected at the ingestion boundary, by reason"
    );
    describe_counter!(
        "crosswatch_rate_limited_total",
        Unit::Count,
        "Requests throttled by the per-tenant rate limiter"
    );
    describe_counter!(
        "crosswatch_actions_dispatched_total",
        Unit::Count,
        "Final dispatch outcomes, by action and outcome"
    );
    describe_counter!(
        "crosswatch_dispatch_skipped_total",
        Unit::Count,
        "Actions skipped because a prior success was on record"
    );
    describe_counter!(
        "crosswatch_pattern_escalations_total",
        Unit::Count,
        "Escalations fired for cross-tenant correlation groups"
    );
    describe_counter!(
        "crosswatch_operator_alerts_total",
        Unit::Count,
        "Terminal delivery failures surfaced to operators"
    );
    describe_gauge!(
        "crosswatch_correlation_groups_open",
        Unit::Count,
        "Correlation groups currently open"
    );
}
