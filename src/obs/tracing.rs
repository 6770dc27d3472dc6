// self
use crate::{
	_prelude::*,
	obs::{FlowKind, RetryReason},
};

/// Future returned by [`FlowSpan::instrument`]; a passthrough when tracing is disabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; a passthrough when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span covering one token API operation or one logical resource call.
///
/// The span carries `flow` and `stage` from creation; `status` is filled in once the call
/// fails with an HTTP status.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a `helix_broker.flow` span for `kind` at call site `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"helix_broker.flow",
				flow = kind.as_str(),
				stage,
				status = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Records the HTTP status that ended the flow.
	pub fn record_status(&self, status: u16) {
		#[cfg(feature = "tracing")]
		self.span.record("status", status);
		#[cfg(not(feature = "tracing"))]
		let _ = status;
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event for a scheduled re-dispatch.
pub fn trace_retry(reason: RetryReason, wait: Duration) {
	#[cfg(feature = "tracing")]
	tracing::debug!(
		reason = reason.as_str(),
		wait_ms = wait.whole_milliseconds() as i64,
		"Retrying request."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (reason, wait);
}
