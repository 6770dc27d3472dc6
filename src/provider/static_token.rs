//! Provider serving one fixed token.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppAccessToken, UserAccessToken, UserId},
	provider::{AuthProvider, ProviderFuture},
};

/// Provider holding exactly one token, supplied by the caller.
///
/// The token is returned as-is: it is never refreshed and its expiry is not checked, so calls
/// made with a stale token fail with the server's 401. An app token answers app-token requests;
/// a user token answers requests for the configured user.
#[derive(Clone, Debug)]
pub struct StaticProvider {
	client_id: String,
	token: AccessToken,
	user_id: Option<UserId>,
}
impl StaticProvider {
	/// Creates a provider serving `token` for the application `client_id`.
	pub fn new(client_id: impl Into<String>, token: impl Into<AccessToken>) -> Self {
		Self { client_id: client_id.into(), token: token.into(), user_id: None }
	}

	/// Declares the owner of a user token.
	pub fn with_user(mut self, user_id: UserId) -> Self {
		self.user_id = Some(user_id);

		self
	}

	/// Token served by the provider.
	pub fn token(&self) -> &AccessToken {
		&self.token
	}

	/// Owner of the token, if declared.
	pub fn user_id(&self) -> Option<&UserId> {
		self.user_id.as_ref()
	}

	fn user_token(&self, user_id: &UserId) -> Result<&UserAccessToken> {
		match (&self.token, &self.user_id) {
			(AccessToken::User(token), Some(owner)) if owner == user_id => Ok(token),
			_ => Err(Error::user_not_found(user_id)),
		}
	}
}
impl AuthProvider for StaticProvider {
	fn client_id(&self) -> &str {
		&self.client_id
	}

	fn app_access_token(&self, _: bool) -> ProviderFuture<'_, AppAccessToken> {
		Box::pin(async move {
			match &self.token {
				AccessToken::App(token) => Ok(token.clone()),
				AccessToken::User(_) => Err(Error::UnsuitableToken),
			}
		})
	}

	fn user_access_token<'a>(
		&'a self,
		user_id: &'a UserId,
		scopes: &'a [&'a str],
	) -> ProviderFuture<'a, UserAccessToken> {
		Box::pin(async move {
			let token = self.user_token(user_id)?;

			if let Some(scope) = token.scope.find_missing(scopes) {
				return Err(Error::MissingScope { scope: scope.to_owned() });
			}

			Ok(token.clone())
		})
	}

	fn any_access_token<'a>(
		&'a self,
		user_id: Option<&'a UserId>,
	) -> ProviderFuture<'a, AccessToken> {
		Box::pin(async move {
			match user_id {
				Some(user_id) if self.user_id.as_ref() == Some(user_id) =>
					Ok(self.user_token(user_id)?.clone().into()),
				_ => Ok(self.token.clone()),
			}
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{ScopeSet, TokenLifetime};

	fn user() -> UserId {
		UserId::new("141981764").expect("User ID fixture should be valid.")
	}

	fn user_provider() -> StaticProvider {
		let token = UserAccessToken::new(
			"user-token",
			"",
			ScopeSet::new(["channel_commercial"]).expect("Scope fixture should be valid."),
			TokenLifetime::default(),
		);

		StaticProvider::new("client", token).with_user(user())
	}

	#[tokio::test]
	async fn user_token_honors_legacy_scopes() {
		let provider = user_provider();
		let token = provider
			.user_access_token(&user(), &["channel:edit:commercial"])
			.await
			.expect("Legacy grant should satisfy the modern scope.");

		assert_eq!(token.access_token.expose(), "user-token");

		let err = provider
			.user_access_token(&user(), &["chat:read"])
			.await
			.expect_err("Ungranted scope must be reported.");

		assert!(matches!(err, Error::MissingScope { scope } if scope == "chat:read"));
	}

	#[tokio::test]
	async fn unknown_users_and_app_requests_are_rejected() {
		let provider = user_provider();
		let stranger = UserId::new("12826").expect("User ID fixture should be valid.");

		assert!(matches!(
			provider.user_access_token(&stranger, &[]).await,
			Err(Error::UserNotFound { .. })
		));
		assert!(matches!(provider.app_access_token(true).await, Err(Error::UnsuitableToken)));
	}

	#[tokio::test]
	async fn any_token_falls_back_to_the_stored_token() {
		let app = AppAccessToken::new("app-token", TokenLifetime::default());
		let provider = StaticProvider::new("client", app.clone());
		let token =
			provider.any_access_token(Some(&user())).await.expect("Stored token should serve.");

		assert_eq!(token, AccessToken::App(app.clone()));
		assert_eq!(provider.app_access_token(false).await.expect("App token should serve."), app);
		assert!(provider.as_refresher().is_none());
	}
}
