// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome, RetryReason},
};

/// Increments `helix_broker_flow_total{flow, outcome}` when the `metrics` feature is enabled.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"helix_broker_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records a scheduled re-dispatch: a trace event plus `helix_broker_retry_total{reason}`.
pub fn record_retry(reason: RetryReason, wait: Duration) {
	obs::trace_retry(reason, wait);

	#[cfg(feature = "metrics")]
	metrics::counter!("helix_broker_retry_total", "reason" => reason.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_a_recorder_is_a_noop() {
		record_flow_outcome(FlowKind::ApiCall, FlowOutcome::Failure);
		record_retry(RetryReason::Unauthorized, Duration::ZERO);
	}
}
