//! Optional observability helpers for token flows and API calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `helix_broker.flow` with the `flow` (grant or
//!   call kind) and `stage` (call site) fields plus the `status` of a failed call, and debug
//!   events for every scheduled retry.
//! - Enable `metrics` to increment the `helix_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the `helix_broker_retry_total`
//!   counter labeled by `reason`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the token API helpers and the request engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization code exchange.
	AuthorizationCode,
	/// Refresh token grant.
	Refresh,
	/// Client credentials grant.
	ClientCredentials,
	/// Token validation.
	Validate,
	/// Token revocation.
	Revoke,
	/// Resource API call executed by the request engine.
	ApiCall,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::Validate => "validate",
			FlowKind::Revoke => "revoke",
			FlowKind::ApiCall => "api_call",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a [`FlowSpan`] and records its attempt and outcome; a failure carrying an
/// HTTP status also lands on the span.
pub(crate) async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			if let Some(status) = e.status() {
				span.record_status(status);
			}

			record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}

/// Reasons the request engine re-dispatches a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetryReason {
	/// 401 answered; the token was refreshed or re-fetched.
	Unauthorized,
	/// 429 answered; the engine waited for the rate-limit reset.
	RateLimited,
	/// 503 answered; the engine waited the fixed unavailable interval.
	Unavailable,
}
impl RetryReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RetryReason::Unauthorized => "unauthorized",
			RetryReason::RateLimited => "rate_limited",
			RetryReason::Unavailable => "unavailable",
		}
	}
}
impl Display for RetryReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
