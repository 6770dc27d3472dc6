//! Retry configuration of the request engine.

// self
use crate::_prelude::*;

/// Interval sentinel requesting back-to-back 503 retries.
pub const NO_RETRY_INTERVAL: Duration = Duration::seconds(-1);
/// Default number of tries for calls answered 503: the first dispatch plus one retry.
pub const DEFAULT_UNAVAILABLE_RETRY_ATTEMPTS: u32 = 2;
/// Default wait between tries of calls answered 503.
pub const DEFAULT_UNAVAILABLE_RETRY_INTERVAL: Duration = Duration::SECOND;

/// Retry behavior of a [`Client`](crate::client::Client) value.
///
/// The 401 refresh-and-retry-once policy is always on; the rate-limit and unavailable policies
/// are opt-in. Values handed to the client are passed through [`finalize`](Self::finalize).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
	/// Enables every retry policy for calls made with this configuration.
	pub retry_all: bool,
	/// Waits for the rate-limit reset and retries once after a 429.
	pub retry_on_rate_limit: bool,
	/// Retries calls answered 503 at a fixed interval.
	pub retry_on_unavailable: bool,
	/// Total tries of a call answered 503, the first one included.
	pub unavailable_retry_attempts: u32,
	/// Wait between tries of a call answered 503; [`NO_RETRY_INTERVAL`] means none.
	pub unavailable_retry_interval: Duration,
	/// Longest acceptable rate-limit wait; zero accepts any wait.
	pub max_rate_limit_wait: Duration,
}
impl RetryConfig {
	/// Replaces unset or unacceptable values with defaults.
	///
	/// - Zero attempts become [`DEFAULT_UNAVAILABLE_RETRY_ATTEMPTS`].
	/// - [`NO_RETRY_INTERVAL`] becomes zero; any other non-positive interval becomes
	///   [`DEFAULT_UNAVAILABLE_RETRY_INTERVAL`].
	/// - A negative maximum rate-limit wait becomes zero (unbounded).
	pub fn finalize(mut self) -> Self {
		if self.unavailable_retry_attempts == 0 {
			self.unavailable_retry_attempts = DEFAULT_UNAVAILABLE_RETRY_ATTEMPTS;
		}

		if self.unavailable_retry_interval == NO_RETRY_INTERVAL {
			self.unavailable_retry_interval = Duration::ZERO;
		} else if !self.unavailable_retry_interval.is_positive() {
			self.unavailable_retry_interval = DEFAULT_UNAVAILABLE_RETRY_INTERVAL;
		}

		if self.max_rate_limit_wait.is_negative() {
			self.max_rate_limit_wait = Duration::ZERO;
		}

		self
	}

	/// Whether a 429 is waited out and retried.
	pub fn retries_rate_limit(&self) -> bool {
		self.retry_all || self.retry_on_rate_limit
	}

	/// Whether a 503 is retried.
	pub fn retries_unavailable(&self) -> bool {
		self.retry_all || self.retry_on_unavailable
	}

	/// Whether a rate-limit wait of `wait` exceeds the configured ceiling.
	pub fn exceeds_max_wait(&self, wait: Duration) -> bool {
		self.max_rate_limit_wait.is_positive() && wait >= self.max_rate_limit_wait
	}
}
impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			retry_all: false,
			retry_on_rate_limit: false,
			retry_on_unavailable: false,
			unavailable_retry_attempts: DEFAULT_UNAVAILABLE_RETRY_ATTEMPTS,
			unavailable_retry_interval: DEFAULT_UNAVAILABLE_RETRY_INTERVAL,
			max_rate_limit_wait: Duration::ZERO,
		}
	}
}
