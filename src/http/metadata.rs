//! Per-call response metadata and rate-limit introspection.

// crates.io
use oauth2::http::HeaderMap;
// self
use crate::_prelude::*;

/// Header carrying the bucket size of the rate limiter.
pub const RATE_LIMIT_LIMIT: &str = "ratelimit-limit";
/// Header carrying the points left in the current window.
pub const RATE_LIMIT_REMAINING: &str = "ratelimit-remaining";
/// Header carrying the Unix timestamp (seconds) at which the bucket refills.
pub const RATE_LIMIT_RESET: &str = "ratelimit-reset";

/// Status, headers, and error envelope of one HTTP response.
///
/// Constructed fresh for every dispatch and returned alongside the decoded payload, including on
/// failure, so callers can inspect the outcome regardless of success.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: u16,
	/// Raw response headers.
	pub headers: HeaderMap,
	/// `error` field of the error envelope.
	pub error: Option<String>,
	/// `status` field of the error envelope.
	pub error_status: Option<u16>,
	/// `message` field of the error envelope.
	pub message: Option<String>,
}
impl ResponseMetadata {
	/// Creates metadata for a response without an error envelope.
	pub fn new(status: u16, headers: HeaderMap) -> Self {
		Self { status, headers, ..Default::default() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Rate-limit bucket size.
	pub fn rate_limit(&self) -> Option<u64> {
		self.header_number(RATE_LIMIT_LIMIT)
	}

	/// Points left in the current rate-limit window.
	pub fn rate_limit_remaining(&self) -> Option<u64> {
		self.header_number(RATE_LIMIT_REMAINING)
	}

	/// Instant at which the rate-limit bucket refills.
	pub fn rate_limit_reset(&self) -> Option<OffsetDateTime> {
		let timestamp = self.header_number(RATE_LIMIT_RESET)?;

		OffsetDateTime::from_unix_timestamp(i64::try_from(timestamp).ok()?).ok()
	}

	/// Wait until the rate-limit reset as seen from `now`; zero when the header is missing or
	/// already in the past.
	pub fn rate_limit_wait_at(&self, now: OffsetDateTime) -> Duration {
		match self.rate_limit_reset() {
			Some(reset) if reset > now => reset - now,
			_ => Duration::ZERO,
		}
	}

	pub(crate) fn record_error_envelope(&mut self, body: &[u8]) {
		#[derive(Deserialize)]
		struct ErrorEnvelope {
			#[serde(default)]
			error: Option<String>,
			#[serde(default)]
			status: Option<u16>,
			#[serde(default)]
			message: Option<String>,
		}

		if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
			self.error = envelope.error;
			self.error_status = envelope.status;
			self.message = envelope.message;
		}
	}

	fn header_number(&self, name: &str) -> Option<u64> {
		self.headers.get(name)?.to_str().ok()?.trim().parse().ok()
	}
}
