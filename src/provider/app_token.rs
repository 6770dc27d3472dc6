//! App-token-only provider plus the cached app-token slot shared with [`RefreshingProvider`].
//!
//! [`RefreshingProvider`]: crate::provider::RefreshingProvider

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppAccessToken, UserAccessToken, UserId},
	config::Endpoints,
	http::HttpTransport,
	oauth::{ClientCredentials, OAuthClient},
	provider::{AuthProvider, ProviderFuture},
};

/// Cached app token guarded by a single-flight lock.
///
/// Reads take the shared lock only; fetches serialize on `guard` so concurrent callers
/// piggy-back on one client credentials grant.
#[derive(Default)]
pub(crate) struct AppTokenSlot {
	token: RwLock<Option<AppAccessToken>>,
	guard: AsyncMutex<()>,
}
impl AppTokenSlot {
	/// Cached token, if present and fresh.
	pub(crate) fn cached(&self) -> Option<AppAccessToken> {
		self.token
			.read()
			.as_ref()
			.filter(|token| !token.access_token.is_empty() && !token.is_expired())
			.cloned()
	}

	pub(crate) async fn get<C>(
		&self,
		oauth: &OAuthClient<C>,
		force_new: bool,
	) -> Result<AppAccessToken>
	where
		C: ?Sized + HttpTransport,
	{
		if !force_new && let Some(token) = self.cached() {
			return Ok(token);
		}

		let seen = self.token.read().clone();
		let _singleflight = self.guard.lock().await;

		// A fetch that completed while we waited already replaced the token we gave up on.
		if let Some(current) = self.cached()
			&& (!force_new || seen.as_ref() != Some(&current))
		{
			return Ok(current);
		}

		let token = oauth.fetch_app_access_token().await?;

		*self.token.write() = Some(token.clone());

		Ok(token)
	}
}

/// Provider that only ever serves app tokens, fetched through the client credentials grant.
///
/// Every user-token request fails with [`Error::UserNotFound`]; [`AuthProvider::any_access_token`]
/// always resolves to the app token.
pub struct AppTokenProvider<C>
where
	C: ?Sized + HttpTransport,
{
	oauth: OAuthClient<C>,
	app: AppTokenSlot,
}
impl<C> AppTokenProvider<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a provider for the application described by `credentials`.
	pub fn new(
		credentials: ClientCredentials,
		endpoints: Endpoints,
		http: impl Into<Arc<C>>,
	) -> Self {
		Self::from_oauth(OAuthClient::new(credentials, endpoints, http))
	}

	/// Wraps an existing token API client.
	pub fn from_oauth(oauth: OAuthClient<C>) -> Self {
		Self { oauth, app: AppTokenSlot::default() }
	}

	/// Token API client used for fetches.
	pub fn oauth(&self) -> &OAuthClient<C> {
		&self.oauth
	}
}
impl<C> AuthProvider for AppTokenProvider<C>
where
	C: ?Sized + HttpTransport,
{
	fn client_id(&self) -> &str {
		self.oauth.client_id().as_ref()
	}

	fn app_access_token(&self, force_new: bool) -> ProviderFuture<'_, AppAccessToken> {
		Box::pin(self.app.get(&self.oauth, force_new))
	}

	fn user_access_token<'a>(
		&'a self,
		user_id: &'a UserId,
		_: &'a [&'a str],
	) -> ProviderFuture<'a, UserAccessToken> {
		Box::pin(async move { Err(Error::user_not_found(user_id)) })
	}

	fn any_access_token<'a>(&'a self, _: Option<&'a UserId>) -> ProviderFuture<'a, AccessToken> {
		Box::pin(async move { Ok(self.app.get(&self.oauth, false).await?.into()) })
	}
}
impl<C> Debug for AppTokenProvider<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppTokenProvider").field("oauth", &self.oauth).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use oauth2::{HttpRequest, HttpResponse};
	// self
	use super::*;
	use crate::http::TransportFuture;

	#[derive(Default)]
	struct CountingTokenApi {
		calls: AtomicUsize,
	}
	impl HttpTransport for CountingTokenApi {
		type TransportError = std::io::Error;

		fn execute(&self, _: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

			Box::pin(async move {
				tokio::time::sleep(std::time::Duration::from_millis(20)).await;

				let body = format!(r#"{{"access_token":"app-{call}","expires_in":3600}}"#);
				let response: HttpResponse = oauth2::http::Response::builder()
					.status(200)
					.body(body.into_bytes())
					.map_err(std::io::Error::other)?;

				Ok(response)
			})
		}
	}

	fn provider() -> (Arc<CountingTokenApi>, AppTokenProvider<CountingTokenApi>) {
		let api = Arc::new(CountingTokenApi::default());
		let provider = AppTokenProvider::new(
			ClientCredentials::new("client", "secret").expect("Credentials should be valid."),
			Endpoints::default(),
			api.clone(),
		);

		(api, provider)
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_fetch() {
		let (api, provider) = provider();
		let (first, second) =
			tokio::join!(provider.app_access_token(false), provider.app_access_token(false));

		assert_eq!(
			first.expect("First caller should succeed."),
			second.expect("Second caller should succeed.")
		);
		assert_eq!(api.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn force_new_bypasses_the_cache() {
		let (api, provider) = provider();
		let cached = provider.app_access_token(false).await.expect("Initial fetch should succeed.");
		let again = provider.any_access_token(None).await.expect("Cached token should serve.");
		let forced = provider.app_access_token(true).await.expect("Forced fetch should succeed.");

		assert_eq!(again, AccessToken::App(cached.clone()));
		assert_ne!(forced, cached);
		assert_eq!(forced.access_token.expose(), "app-2");
		assert_eq!(api.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn user_tokens_are_never_available() {
		let (api, provider) = provider();
		let user = UserId::new("141981764").expect("User ID fixture should be valid.");

		assert!(matches!(
			provider.user_access_token(&user, &[]).await,
			Err(Error::UserNotFound { .. })
		));
		assert_eq!(api.calls.load(Ordering::SeqCst), 0);
	}
}
