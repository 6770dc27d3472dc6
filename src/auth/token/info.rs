//! Server-reported token metadata returned by the validation endpoint.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ScopeSet, UserId, token::lifetime::seconds},
};

/// Metadata the token API reports for a validated access token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
	/// Client ID the token was issued to.
	#[serde(default)]
	pub client_id: String,
	/// Login name of the token owner; absent for app tokens.
	#[serde(default)]
	pub login: Option<String>,
	/// Scopes granted to the token.
	#[serde(default)]
	pub scopes: ScopeSet,
	/// User ID of the token owner; absent for app tokens.
	#[serde(default)]
	pub user_id: Option<String>,
	/// Remaining lifetime reported by the server.
	#[serde(default, with = "seconds")]
	pub expires_in: Duration,
}
impl TokenInfo {
	/// Owner of the token, if the server reported a usable user ID.
	pub fn owner(&self) -> Option<UserId> {
		self.user_id.as_deref().filter(|id| !id.is_empty()).and_then(|id| UserId::new(id).ok())
	}
}

/// Access token paired with the metadata learned by validating it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessTokenWithInfo {
	/// Validated token.
	pub token: AccessToken,
	/// Server-reported metadata.
	pub info: TokenInfo,
}
