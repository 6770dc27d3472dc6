//! Token lifetime tracking with a fixed safety margin.

// self
use crate::_prelude::*;

/// Margin subtracted from a token's nominal expiry so it is never used mid-flight.
pub const SAFETY_MARGIN: Duration = Duration::seconds(30);

/// Freshness of a token relative to an instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
	/// Token can be used as-is.
	Fresh,
	/// Token reached its expiry threshold (nominal expiry minus [`SAFETY_MARGIN`]).
	Expired,
	/// Token was never stamped by this library, so its age is unknown.
	Unknown,
}

/// Declared validity window of a token plus the instant it was obtained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLifetime {
	/// Validity window declared by the token API at issuance.
	#[serde(default, with = "seconds")]
	pub expires_in: Duration,
	/// Instant the token was fetched; unset for externally supplied tokens.
	#[serde(default, with = "time::serde::timestamp::option")]
	pub obtained_at: Option<OffsetDateTime>,
}
impl TokenLifetime {
	/// Lifetime of a token that has not been stamped yet.
	pub fn new(expires_in: Duration) -> Self {
		Self { expires_in, obtained_at: None }
	}

	/// Lifetime of a token obtained at the provided instant.
	pub fn stamped_at(expires_in: Duration, instant: OffsetDateTime) -> Self {
		Self { expires_in, obtained_at: Some(instant) }
	}

	/// Lifetime of a token obtained right now.
	pub fn stamped_now(expires_in: Duration) -> Self {
		Self::stamped_at(expires_in, OffsetDateTime::now_utc())
	}

	/// Instant at which the token stops being usable, safety margin included.
	///
	/// `None` when the token was never stamped or the threshold falls outside the representable
	/// date range.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.obtained_at?.checked_add(self.expires_in)?.checked_sub(SAFETY_MARGIN)
	}

	/// Classifies the token at the provided instant; the threshold itself counts as expired.
	///
	/// A threshold beyond the representable range never expires; one before it always has.
	pub fn freshness_at(&self, instant: OffsetDateTime) -> Freshness {
		if self.obtained_at.is_none() {
			return Freshness::Unknown;
		}

		match self.expires_at() {
			Some(threshold) if instant >= threshold => Freshness::Expired,
			Some(_) => Freshness::Fresh,
			None if self.expires_in.is_positive() => Freshness::Fresh,
			None => Freshness::Expired,
		}
	}

	/// Classifies the token using the current UTC instant.
	pub fn freshness(&self) -> Freshness {
		self.freshness_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` unless the token is known to be fresh at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		!matches!(self.freshness_at(instant), Freshness::Fresh)
	}

	/// Returns `true` unless the token is known to be fresh right now.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Sets `obtained_at` to the provided instant if it is unset or `force` is requested.
	pub fn stamp_at(&mut self, instant: OffsetDateTime, force: bool) {
		if self.obtained_at.is_none() || force {
			self.obtained_at = Some(instant);
		}
	}

	/// Sets `obtained_at` to now if it is unset or `force` is requested.
	pub fn stamp(&mut self, force: bool) {
		self.stamp_at(OffsetDateTime::now_utc(), force);
	}
}

pub(crate) mod seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Duration::seconds(<Option<i64>>::deserialize(deserializer)?.unwrap_or_default()))
	}
}
