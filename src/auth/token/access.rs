//! Application and user access tokens.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenLifetime, TokenSecret},
};

/// Credential representing the calling application itself.
///
/// App tokens carry neither a refresh token nor a scope set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAccessToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Declared lifetime and obtain instant.
	#[serde(flatten)]
	pub lifetime: TokenLifetime,
}
impl AppAccessToken {
	/// Creates an app token with the provided lifetime.
	pub fn new(access_token: impl Into<String>, lifetime: TokenLifetime) -> Self {
		Self { access_token: TokenSecret::new(access_token), lifetime }
	}

	/// Returns `true` unless the token is known to be fresh.
	pub fn is_expired(&self) -> bool {
		self.lifetime.is_expired()
	}
}
impl Debug for AppAccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppAccessToken")
			.field("access_token", &"<redacted>")
			.field("lifetime", &self.lifetime)
			.finish()
	}
}

/// Credential representing one authorized user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccessToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret. Providers refuse to cache user tokens without one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
	/// Scopes granted to the token.
	#[serde(default)]
	pub scope: ScopeSet,
	/// Declared lifetime and obtain instant.
	#[serde(flatten)]
	pub lifetime: TokenLifetime,
}
impl UserAccessToken {
	/// Creates a user token. An empty `refresh_token` is stored as absent.
	pub fn new(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		scope: ScopeSet,
		lifetime: TokenLifetime,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::non_empty(refresh_token),
			scope,
			lifetime,
		}
	}

	/// Returns the refresh token when it is present and non-empty.
	pub fn usable_refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref().filter(|secret| !secret.is_empty())
	}

	/// Returns `true` unless the token is known to be fresh.
	pub fn is_expired(&self) -> bool {
		self.lifetime.is_expired()
	}
}
impl Debug for UserAccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserAccessToken")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("scope", &self.scope)
			.field("lifetime", &self.lifetime)
			.finish()
	}
}

/// Either kind of access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessToken {
	/// Application token.
	App(AppAccessToken),
	/// User token.
	User(UserAccessToken),
}
impl AccessToken {
	/// Access token secret.
	pub fn access_token(&self) -> &TokenSecret {
		match self {
			Self::App(token) => &token.access_token,
			Self::User(token) => &token.access_token,
		}
	}

	/// Refresh token, if the token can be refreshed.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		match self {
			Self::App(_) => None,
			Self::User(token) => token.usable_refresh_token(),
		}
	}

	/// Granted scopes; app tokens have none.
	pub fn scope(&self) -> Option<&ScopeSet> {
		match self {
			Self::App(_) => None,
			Self::User(token) => Some(&token.scope),
		}
	}

	/// Lifetime of the token.
	pub fn lifetime(&self) -> &TokenLifetime {
		match self {
			Self::App(token) => &token.lifetime,
			Self::User(token) => &token.lifetime,
		}
	}

	/// Mutable lifetime of the token.
	pub fn lifetime_mut(&mut self) -> &mut TokenLifetime {
		match self {
			Self::App(token) => &mut token.lifetime,
			Self::User(token) => &mut token.lifetime,
		}
	}

	/// Returns `true` unless the token is known to be fresh.
	pub fn is_expired(&self) -> bool {
		self.lifetime().is_expired()
	}
}
impl From<AppAccessToken> for AccessToken {
	fn from(value: AppAccessToken) -> Self {
		Self::App(value)
	}
}
impl From<UserAccessToken> for AccessToken {
	fn from(value: UserAccessToken) -> Self {
		Self::User(value)
	}
}
