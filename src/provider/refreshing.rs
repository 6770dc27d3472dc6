//! Caching provider that refreshes app and user tokens on demand.
//!
//! The provider owns two independently locked regions: the app-token slot and the user-token
//! map. Neither lock is ever held across a network call. Refreshes of one user serialize on a
//! per-user guard; a caller that waited on the guard reuses the token the previous holder stored
//! instead of refreshing a second time.
//!
//! Every refresh of a cached user ends in exactly one notification when a handler is registered:
//! `on_refresh` after a stored refresh, `on_refresh_failure` otherwise. Refreshes whose user
//! cannot be determined notify nobody.

// self
use crate::{
	_prelude::*,
	auth::{
		AccessToken, AccessTokenWithInfo, AppAccessToken, Freshness, ScopeSet, TokenInfo,
		TokenLifetime, TokenSecret, UserAccessToken, UserId,
	},
	config::Endpoints,
	error::ConfigError,
	http::HttpTransport,
	oauth::{AuthorizationRequest, AuthorizationUrl, ClientCredentials, OAuthClient},
	provider::{
		self, AppTokenSlot, AuthProvider, ProviderFuture, RefreshFailure, RefreshFailureHandler,
		RefreshHandler, RefreshProvider,
	},
};

/// Outcome of a coalesced user refresh.
enum Refreshed {
	/// This caller hit the token endpoint.
	Fetched(UserAccessToken),
	/// Another caller refreshed while this one waited on the guard.
	Reused(UserAccessToken),
}

/// Provider caching one app token plus the tokens of any number of users.
pub struct RefreshingProvider<C>
where
	C: ?Sized + HttpTransport,
{
	oauth: OAuthClient<C>,
	redirect_uri: Option<String>,
	scopes: Vec<String>,
	app: AppTokenSlot,
	users: RwLock<HashMap<UserId, UserAccessToken>>,
	user_guards: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
	on_refresh: Option<RefreshHandler>,
	on_refresh_failure: Option<RefreshFailureHandler>,
}
impl<C> RefreshingProvider<C>
where
	C: ?Sized + HttpTransport,
{
	/// Wraps an existing token API client, with no redirect URI, default scopes, or handlers.
	pub fn from_oauth(oauth: OAuthClient<C>) -> Self {
		Self {
			oauth,
			redirect_uri: None,
			scopes: Vec::new(),
			app: AppTokenSlot::default(),
			users: Default::default(),
			user_guards: Default::default(),
			on_refresh: None,
			on_refresh_failure: None,
		}
	}

	/// Token API client used for grants, validation, and revocation.
	pub fn oauth(&self) -> &OAuthClient<C> {
		&self.oauth
	}

	/// Caches `token` for `user_id`, replacing any previous entry.
	///
	/// Tokens without a refresh token are rejected with [`Error::EmptyRefreshToken`].
	pub fn add_user(&self, user_id: UserId, token: UserAccessToken) -> Result<()> {
		if token.usable_refresh_token().is_none() {
			return Err(Error::EmptyRefreshToken);
		}

		self.users.write().insert(user_id, token);

		Ok(())
	}

	/// Forgets `user_id`; returns whether the user was cached.
	pub fn remove_user(&self, user_id: &UserId) -> bool {
		self.user_guards.lock().remove(user_id);

		self.users.write().remove(user_id).is_some()
	}

	/// Returns whether `user_id` is cached.
	pub fn has_user(&self, user_id: &UserId) -> bool {
		self.users.read().contains_key(user_id)
	}

	/// Snapshot of the cached token of `user_id`.
	pub fn user_token(&self, user_id: &UserId) -> Option<UserAccessToken> {
		self.users.read().get(user_id).cloned()
	}

	/// Onboards the owner of an externally obtained token and returns their ID.
	///
	/// A token that is not known to be expired is validated first; a 401 from validation is
	/// treated like an expired token. Without a usable validation result the token must carry a
	/// refresh token, which is redeemed and the new token validated instead. The owner must
	/// resolve to a user ID, otherwise the call fails with [`Error::UnsuitableToken`].
	pub async fn add_user_for_token(&self, token: impl Into<AccessToken>) -> Result<UserId> {
		let token = token.into();
		let validated = self.validate_if_usable(&token).await?;
		let (mut user_token, info) = match validated {
			Some(info) => match token {
				AccessToken::User(mut user_token) if info.owner().is_some() => {
					restamp(&mut user_token.lifetime, &info);

					(user_token, info)
				},
				_ => return Err(Error::UnsuitableToken),
			},
			None => {
				let refresh_token = token.refresh_token().ok_or(Error::EmptyRefreshToken)?;

				self.refresh_and_validate(refresh_token).await?
			},
		};
		let user_id = info.owner().ok_or(Error::UnsuitableToken)?;

		if user_token.scope.is_empty() {
			user_token.scope = info.scopes.clone();
		}

		self.add_user(user_id.clone(), user_token)?;

		Ok(user_id)
	}

	/// Exchanges an authorization code and onboards the resulting token's owner.
	///
	/// Requires a redirect URI configured on the builder.
	pub async fn add_user_for_code(&self, code: &str) -> Result<UserId> {
		let redirect_uri = self.redirect_uri.as_deref().ok_or(ConfigError::EmptyRedirectUri)?;
		let token = self.oauth.exchange_code(code, redirect_uri).await?;

		self.add_user_for_token(token).await
	}

	/// Redeems a refresh token whose owner is not known to the caller.
	///
	/// The new access token is validated to discover its owner, who must already be cached; the
	/// cached entry is then replaced.
	pub async fn refresh_unknown_user_access_token(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<AccessTokenWithInfo> {
		let (token, info) = self.refresh_and_validate(refresh_token).await?;
		let user_id = info.owner().ok_or(Error::UnsuitableToken)?;
		let stored = self.replace_user(&user_id, token.clone());

		match stored {
			Ok(()) => self.notify_refresh(&user_id, &token),
			Err(ref e) => self.notify_refresh_failure(&user_id, e),
		}

		stored.map(|()| AccessTokenWithInfo { token: token.into(), info })
	}

	/// Authorization URL for the configured redirect URI and default scopes.
	pub fn authorization_url(&self, force_verify: bool) -> Result<AuthorizationUrl> {
		let redirect_uri = self.redirect_uri.clone().ok_or(ConfigError::EmptyRedirectUri)?;

		self.oauth.authorization_url(&AuthorizationRequest {
			redirect_uri,
			scopes: self.scopes.clone(),
			force_verify,
			..Default::default()
		})
	}

	async fn validate_if_usable(&self, token: &AccessToken) -> Result<Option<TokenInfo>> {
		if token.access_token().is_empty() || token.lifetime().freshness() == Freshness::Expired {
			return Ok(None);
		}

		match self.oauth.validate_token(token.access_token()).await {
			Ok(info) if !info.client_id.is_empty() => Ok(Some(info)),
			Ok(_) => Ok(None),
			Err(e) if e.status() == Some(401) => Ok(None),
			Err(e) => Err(e),
		}
	}

	async fn refresh_and_validate(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<(UserAccessToken, TokenInfo)> {
		let mut token = self.oauth.refresh_token(refresh_token).await?;
		let info = self.oauth.validate_token(&token.access_token).await?;

		if token.refresh_token.is_none() {
			token.refresh_token = Some(refresh_token.clone());
		}
		if token.scope.is_empty() {
			token.scope = info.scopes.clone();
		}

		restamp(&mut token.lifetime, &info);

		Ok((token, info))
	}

	async fn refresh_user(
		&self,
		user_id: &UserId,
		seen: Option<UserAccessToken>,
	) -> Result<UserAccessToken> {
		match self.refresh_user_coalesced(user_id, seen).await {
			Ok(Refreshed::Fetched(token)) => {
				self.notify_refresh(user_id, &token);

				Ok(token)
			},
			Ok(Refreshed::Reused(token)) => Ok(token),
			Err(e) => {
				self.notify_refresh_failure(user_id, &e);

				Err(e)
			},
		}
	}

	async fn refresh_user_coalesced(
		&self,
		user_id: &UserId,
		seen: Option<UserAccessToken>,
	) -> Result<Refreshed> {
		let guard = self.user_guard(user_id);
		let _singleflight = guard.lock().await;
		let current = self.user_token(user_id).ok_or_else(|| Error::user_not_found(user_id))?;

		if seen.is_some_and(|seen| seen != current) && !current.is_expired() {
			return Ok(Refreshed::Reused(current));
		}

		let refresh_token = current.usable_refresh_token().ok_or(Error::EmptyRefreshToken)?;
		let mut token = self.oauth.refresh_token(refresh_token).await?;

		if token.refresh_token.is_none() {
			token.refresh_token = current.refresh_token.clone();
		}
		if token.scope.is_empty() {
			token.scope = current.scope.clone();
		}

		// The user may have been removed while the refresh was in flight.
		self.replace_user(user_id, token.clone())?;

		Ok(Refreshed::Fetched(token))
	}

	fn replace_user(&self, user_id: &UserId, token: UserAccessToken) -> Result<()> {
		match self.users.write().get_mut(user_id) {
			Some(entry) => {
				*entry = token;

				Ok(())
			},
			None => Err(Error::user_not_found(user_id)),
		}
	}

	fn user_guard(&self, user_id: &UserId) -> Arc<AsyncMutex<()>> {
		self.user_guards.lock().entry(user_id.clone()).or_default().clone()
	}

	fn notify_refresh(&self, user_id: &UserId, token: &UserAccessToken) {
		if let Some(handler) = self.on_refresh.clone() {
			let (user_id, token) = (user_id.clone(), token.clone());

			provider::deliver(move || handler(user_id, token));
		}
	}

	fn notify_refresh_failure(&self, user_id: &UserId, e: &Error) {
		if let Some(handler) = self.on_refresh_failure.clone() {
			let (user_id, failure) = (user_id.clone(), RefreshFailure::from(e));

			provider::deliver(move || handler(user_id, failure));
		}
	}
}
impl<C> AuthProvider for RefreshingProvider<C>
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
		scopes: &'a [&'a str],
	) -> ProviderFuture<'a, UserAccessToken> {
		Box::pin(async move {
			let token = self.user_token(user_id).ok_or_else(|| Error::user_not_found(user_id))?;

			if let Some(scope) = token.scope.find_missing(scopes) {
				return Err(Error::MissingScope { scope: scope.to_owned() });
			}
			if !token.access_token.is_empty() && !token.is_expired() {
				return Ok(token);
			}

			self.refresh_user(user_id, Some(token)).await
		})
	}

	fn any_access_token<'a>(
		&'a self,
		user_id: Option<&'a UserId>,
	) -> ProviderFuture<'a, AccessToken> {
		Box::pin(async move {
			match user_id {
				Some(user_id) if self.has_user(user_id) =>
					Ok(self.user_access_token(user_id, &[]).await?.into()),
				_ => Ok(self.app.get(&self.oauth, false).await?.into()),
			}
		})
	}

	fn as_refresher(&self) -> Option<&dyn RefreshProvider> {
		Some(self)
	}
}
impl<C> RefreshProvider for RefreshingProvider<C>
where
	C: ?Sized + HttpTransport,
{
	fn refresh_user_access_token<'a>(
		&'a self,
		user_id: &'a UserId,
	) -> ProviderFuture<'a, UserAccessToken> {
		Box::pin(async move { self.refresh_user(user_id, self.user_token(user_id)).await })
	}
}
impl<C> Debug for RefreshingProvider<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshingProvider")
			.field("oauth", &self.oauth)
			.field("redirect_uri", &self.redirect_uri)
			.field("scopes", &self.scopes)
			.field("users", &self.users.read().len())
			.finish_non_exhaustive()
	}
}

/// Builder for [`RefreshingProvider`] values; validation happens in [`build`](Self::build).
#[derive(Clone)]
pub struct RefreshingProviderBuilder {
	client_id: String,
	client_secret: String,
	redirect_uri: Option<String>,
	scopes: Vec<String>,
	endpoints: Endpoints,
	on_refresh: Option<RefreshHandler>,
	on_refresh_failure: Option<RefreshFailureHandler>,
}
impl RefreshingProviderBuilder {
	/// Starts a builder for the application identified by `client_id`.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			redirect_uri: None,
			scopes: Vec::new(),
			endpoints: Endpoints::default(),
			on_refresh: None,
			on_refresh_failure: None,
		}
	}

	/// Redirect URI used by code exchanges and authorization URLs.
	pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
		self.redirect_uri = Some(redirect_uri.into());

		self
	}

	/// Scopes requested by [`RefreshingProvider::authorization_url`], in order.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the API endpoints.
	pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Registers the handler notified after every stored user refresh.
	pub fn on_refresh<F>(mut self, handler: F) -> Self
	where
		F: 'static + Fn(UserId, UserAccessToken) + Send + Sync,
	{
		self.on_refresh = Some(Arc::new(handler));

		self
	}

	/// Registers the handler notified after every failed user refresh.
	pub fn on_refresh_failure<F>(mut self, handler: F) -> Self
	where
		F: 'static + Fn(UserId, RefreshFailure) + Send + Sync,
	{
		self.on_refresh_failure = Some(Arc::new(handler));

		self
	}

	/// Validates the configuration and builds a provider over `http`.
	pub fn build<C>(self, http: impl Into<Arc<C>>) -> Result<RefreshingProvider<C>>
	where
		C: ?Sized + HttpTransport,
	{
		if self.redirect_uri.as_deref().is_some_and(str::is_empty) {
			return Err(ConfigError::EmptyRedirectUri.into());
		}

		ScopeSet::new(self.scopes.iter().map(String::as_str)).map_err(ConfigError::from)?;

		let credentials = ClientCredentials::new(&self.client_id, self.client_secret)?;
		let oauth = OAuthClient::new(credentials, self.endpoints, http);

		Ok(RefreshingProvider {
			redirect_uri: self.redirect_uri,
			scopes: self.scopes,
			on_refresh: self.on_refresh,
			on_refresh_failure: self.on_refresh_failure,
			..RefreshingProvider::from_oauth(oauth)
		})
	}
}
impl Debug for RefreshingProviderBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshingProviderBuilder")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_uri", &self.redirect_uri)
			.field("scopes", &self.scopes)
			.field("endpoints", &self.endpoints)
			.finish_non_exhaustive()
	}
}

fn restamp(lifetime: &mut TokenLifetime, info: &TokenInfo) {
	if info.expires_in.is_positive() {
		*lifetime = TokenLifetime::stamped_now(info.expires_in);
	}
}
