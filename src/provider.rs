//! Token providers consumed by the request engine.
//!
//! [`AuthProvider`] is the capability set the engine depends on: resolve the app token, resolve a
//! user token with a scope constraint, or resolve whichever token fits a call. Refreshing user
//! tokens is an optional capability surfaced through [`AuthProvider::as_refresher`], so minimal
//! providers such as [`StaticProvider`] stay trivial.
//!
//! - [`StaticProvider`] serves one fixed token and cannot refresh.
//! - [`AppTokenProvider`] fetches and caches app tokens through the client credentials grant.
//! - [`RefreshingProvider`] caches one app token plus any number of user tokens and refreshes
//!   them on demand, notifying registered handlers of every refresh attempt.

pub mod app_token;
pub mod refreshing;
pub mod static_token;

pub use app_token::*;
pub use refreshing::*;
pub use static_token::*;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppAccessToken, UserAccessToken, UserId},
	http::AuthScheme,
};

/// Boxed future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Token source used by [`Client`](crate::client::Client).
pub trait AuthProvider
where
	Self: Send + Sync,
{
	/// Client ID sent alongside every authorized call.
	fn client_id(&self) -> &str;

	/// Scheme placed before the token in the `Authorization` header.
	fn authorization_scheme(&self) -> AuthScheme {
		AuthScheme::Bearer
	}

	/// Returns the app token, fetching a new one when `force_new` is set or the cached one is
	/// stale.
	fn app_access_token(&self, force_new: bool) -> ProviderFuture<'_, AppAccessToken>;

	/// Returns the token of `user_id`, which must grant every scope in `scopes`.
	fn user_access_token<'a>(
		&'a self,
		user_id: &'a UserId,
		scopes: &'a [&'a str],
	) -> ProviderFuture<'a, UserAccessToken>;

	/// Returns the token of `user_id` when that user is known, the app token otherwise.
	fn any_access_token<'a>(
		&'a self,
		user_id: Option<&'a UserId>,
	) -> ProviderFuture<'a, AccessToken>;

	/// Exposes the refresh capability, if the provider has one.
	fn as_refresher(&self) -> Option<&dyn RefreshProvider> {
		None
	}
}

/// Optional capability of providers that can refresh user tokens.
pub trait RefreshProvider
where
	Self: Send + Sync,
{
	/// Refreshes the cached token of `user_id` and returns the new value.
	fn refresh_user_access_token<'a>(
		&'a self,
		user_id: &'a UserId,
	) -> ProviderFuture<'a, UserAccessToken>;
}
impl dyn AuthProvider {
	/// Refreshes `user_id` through the provider's refresh capability.
	///
	/// Fails with [`Error::NotARefresher`] when the provider has none.
	pub async fn refresh_user_access_token(&self, user_id: &UserId) -> Result<UserAccessToken> {
		match self.as_refresher() {
			Some(refresher) => refresher.refresh_user_access_token(user_id).await,
			None => Err(Error::NotARefresher),
		}
	}
}

/// Summary of a failed refresh handed to failure handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshFailure {
	/// Rendered error.
	pub reason: String,
	/// HTTP status returned by the token API, when it answered.
	pub status: Option<u16>,
}
impl From<&Error> for RefreshFailure {
	fn from(e: &Error) -> Self {
		Self { reason: e.to_string(), status: e.status() }
	}
}

/// Handler invoked after a successful refresh.
pub type RefreshHandler = Arc<dyn Fn(UserId, UserAccessToken) + Send + Sync>;
/// Handler invoked after a failed refresh.
pub type RefreshFailureHandler = Arc<dyn Fn(UserId, RefreshFailure) + Send + Sync>;

/// Runs a notification off the caller's path.
///
/// Handlers are synchronous, so they land on the runtime's blocking pool; without a runtime they
/// get a dedicated thread.
pub(crate) fn deliver<F>(notify: F)
where
	F: 'static + FnOnce() + Send,
{
	match tokio::runtime::Handle::try_current() {
		Ok(handle) => {
			handle.spawn_blocking(notify);
		},
		Err(_) => {
			std::thread::spawn(notify);
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::TokenLifetime;

	#[tokio::test]
	async fn refresh_without_capability_fails() {
		let provider: Arc<dyn AuthProvider> = Arc::new(StaticProvider::new(
			"client",
			AppAccessToken::new("app", TokenLifetime::stamped_now(Duration::hours(1))),
		));
		let user = UserId::new("141981764").expect("User ID fixture should be valid.");
		let err = provider
			.refresh_user_access_token(&user)
			.await
			.expect_err("Static providers cannot refresh.");

		assert!(matches!(err, Error::NotARefresher));
	}

	#[test]
	fn failure_summary_keeps_status() {
		let err =
			Error::UnsuccessfulRequest { status: 400, message: Some("Invalid refresh token".into()) };
		let failure = RefreshFailure::from(&err);

		assert_eq!(failure.status, Some(400));
		assert!(failure.reason.contains("Invalid refresh token"));
	}
}
