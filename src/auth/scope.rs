//! Scope modeling helpers, including the legacy scope-equivalence table.

// std
use std::{cmp::Ordering, collections::BTreeSet, slice::Iter};
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError, ser::SerializeSeq};
// self
use crate::_prelude::*;

/// Legacy scope names and the modern scopes a grant of them also satisfies.
///
/// A token granted a key of this table satisfies requests for every listed value.
pub const LEGACY_SCOPE_EQUIVALENTS: &[(&str, &[&str])] = &[
	("channel_commercial", &["channel:edit:commercial"]),
	("channel_editor", &["channel:manage:broadcast"]),
	("channel_read", &["channel:read:stream_key"]),
	("channel_subscriptions", &["channel:read:subscriptions"]),
	("user_blocks_read", &["user:read:blocked_users"]),
	("user_blocks_edit", &["user:manage:blocked_users"]),
	("user_follows_edit", &["user:edit:follows"]),
	("user_read", &["user:read:email"]),
	("user_subscriptions", &["user:read:subscriptions"]),
	("user:edit:broadcast", &["channel:manage:broadcast", "channel:manage:extensions"]),
];

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Normalized set of OAuth scopes granted to a token.
///
/// Scopes are deduplicated and sorted so equality, ordering, and hashing remain stable. The
/// token API reports scopes either as a JSON array or as a space-delimited string; both
/// shapes (and `null`) deserialize into a set.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet {
	scopes: Arc<[String]>,
}
impl ScopeSet {
	/// Creates a normalized scope set from any iterator.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Ok(Self { scopes: normalize(scopes)? })
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.scopes.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.scopes.is_empty()
	}

	/// Returns true if the normalized set contains the provided scope verbatim.
	pub fn contains(&self, scope: &str) -> bool {
		self.scopes.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Iterator over normalized scopes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.scopes.iter().map(|s| s.as_str())
	}

	/// Returns the normalized string representation (space-delimited).
	pub fn normalized(&self) -> String {
		self.scopes.join(" ")
	}

	/// Returns the underlying slice of scope strings.
	pub fn as_slice(&self) -> &[String] {
		&self.scopes
	}

	/// Returns true if the granted scope (or a legacy scope equivalent to it) is present.
	pub fn grants(&self, scope: &str) -> bool {
		self.contains(scope)
			|| self.iter().any(|granted| {
				legacy_equivalents(granted).is_some_and(|modern| modern.contains(&scope))
			})
	}

	/// Returns the first requested scope, in request order, that this grant does not satisfy.
	///
	/// An empty request is always satisfied.
	pub fn find_missing<'a, S>(&self, requested: &'a [S]) -> Option<&'a str>
	where
		S: AsRef<str>,
	{
		requested.iter().map(AsRef::as_ref).find(|scope| !self.grants(scope))
	}
}
impl PartialOrd for ScopeSet {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
impl Ord for ScopeSet {
	fn cmp(&self, other: &Self) -> Ordering {
		self.scopes.cmp(&other.scopes)
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.scopes).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}

/// Iterator over scope strings.
pub struct ScopeIter<'a> {
	inner: Iter<'a, String>,
}
impl<'a> Iterator for ScopeIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|s| s.as_str())
	}
}
impl TryFrom<Vec<String>> for ScopeSet {
	type Error = ScopeValidationError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl<'a> IntoIterator for &'a ScopeSet {
	type IntoIter = ScopeIter<'a>;
	type Item = &'a str;

	fn into_iter(self) -> Self::IntoIter {
		ScopeIter { inner: self.scopes.iter() }
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::default());
		}
		if s.chars().all(char::is_whitespace) {
			return Err(ScopeValidationError::Empty);
		}

		Self::new(s.split_whitespace())
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(self.scopes.len()))?;

		for scope in self.scopes.iter() {
			seq.serialize_element(scope)?;
		}

		seq.end()
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum WireScopes {
			List(Vec<String>),
			Joined(String),
		}

		match <Option<WireScopes>>::deserialize(deserializer)? {
			None => Ok(Self::default()),
			Some(WireScopes::List(values)) =>
				Self::new(values.into_iter().filter(|scope| !scope.is_empty()))
					.map_err(DeError::custom),
			Some(WireScopes::Joined(joined)) =>
				Self::new(joined.split_whitespace()).map_err(DeError::custom),
		}
	}
}

fn legacy_equivalents(scope: &str) -> Option<&'static [&'static str]> {
	LEGACY_SCOPE_EQUIVALENTS.iter().find(|(legacy, _)| *legacy == scope).map(|(_, modern)| *modern)
}

fn normalize<I, S>(scopes: I) -> Result<Arc<[String]>, ScopeValidationError>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut set = BTreeSet::new();

	for scope in scopes {
		let owned: String = scope.into();

		if owned.is_empty() {
			return Err(ScopeValidationError::Empty);
		}
		if owned.chars().any(char::is_whitespace) {
			return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
		}

		set.insert(owned);
	}

	Ok(Arc::from(set.into_iter().collect::<Vec<_>>()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scopes_normalize_and_compare() {
		let lhs = ScopeSet::new(["chat:read", "bits:read", "bits:read"])
			.expect("Left-hand scope set should be valid.");
		let rhs =
			ScopeSet::new(["bits:read", "chat:read"]).expect("Right-hand scope set should be valid.");

		assert_eq!(lhs, rhs);
		assert_eq!(lhs.normalized(), "bits:read chat:read");
	}

	#[test]
	fn scopes_reject_whitespace_padding() {
		let err = ScopeSet::new([" chat:read "]).expect_err("Padded scopes must be rejected.");

		assert!(matches!(err, ScopeValidationError::ContainsWhitespace { .. }));
		assert!(ScopeSet::from_str("").is_ok(), "Empty string represents an empty scope set.");
		assert!(ScopeSet::from_str("   ").is_err(), "Whitespace-only input must be rejected.");
		assert!(ScopeSet::new([""]).is_err());
	}

	#[test]
	fn legacy_grant_satisfies_modern_request() {
		let legacy = ScopeSet::new(["channel_commercial"]).expect("Legacy scope should be valid.");
		let modern =
			ScopeSet::new(["channel:edit:commercial"]).expect("Modern scope should be valid.");

		assert_eq!(legacy.find_missing(&["channel:edit:commercial"]), None);
		assert_eq!(modern.find_missing(&["channel:edit:commercial"]), None);
		// Equivalence only flows from the legacy grant to the modern request.
		assert_eq!(modern.find_missing(&["channel_commercial"]), Some("channel_commercial"));
	}

	#[test]
	fn multi_valued_equivalents_cover_each_modern_scope() {
		let granted = ScopeSet::new(["user:edit:broadcast"]).expect("Scope should be valid.");

		assert_eq!(
			granted.find_missing(&["channel:manage:broadcast", "channel:manage:extensions"]),
			None
		);
		assert!(granted.grants("user:edit:broadcast"));
	}

	#[test]
	fn missing_scope_is_first_in_request_order() {
		let granted = ScopeSet::new(["chat:read"]).expect("Scope should be valid.");
		let requested = ["chat:read", "moderator:read:chatters", "bits:read"];

		assert_eq!(granted.find_missing(&requested), Some("moderator:read:chatters"));
		assert_eq!(ScopeSet::default().find_missing::<&str>(&[]), None);
		assert_eq!(
			ScopeSet::default().find_missing(&["analytics:read:games"]),
			Some("analytics:read:games")
		);
	}

	#[test]
	fn deserializes_array_string_and_null() {
		let from_array: ScopeSet = serde_json::from_str(r#"["user:read:email", "chat:read"]"#)
			.expect("Array form should parse.");
		let from_string: ScopeSet = serde_json::from_str(r#""chat:read user:read:email""#)
			.expect("String form should parse.");
		let from_null: ScopeSet = serde_json::from_str("null").expect("Null should parse.");

		assert_eq!(from_array, from_string);
		assert!(from_null.is_empty());
		assert_eq!(
			serde_json::to_string(&from_array).expect("Scope set should serialize."),
			r#"["chat:read","user:read:email"]"#
		);
	}
}
