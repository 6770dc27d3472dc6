//! Token API client: grants, validation, revocation, and authorization URLs.
//!
//! Every call goes through the injected [`HttpTransport`] without retries; the token API is
//! consulted by the providers, which own caching and refresh coordination.

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AccessToken, AuthType, AuthUrl, AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, Scope, StandardRevocableToken,
	TokenResponse as _, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{
		AppAccessToken, ClientId, ScopeSet, TokenInfo, TokenLifetime, TokenSecret,
		UserAccessToken,
	},
	config::Endpoints,
	error::{ConfigError, TransportError},
	http::{
		self, ApiRequest, AuthScheme, Authorization, HttpTransport, ResponseMetadata, TokenHandle,
	},
	obs::{self, FlowKind},
};

type TokenClient = oauth2::Client<
	BasicErrorResponse,
	TokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type TokenRequestError<E> = RequestTokenError<HttpClientError<E>, BasicErrorResponse>;

/// Grant types understood by the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Application token grant.
	ClientCredentials,
	/// Authorization code exchange.
	AuthorizationCode,
	/// Refresh token grant.
	RefreshToken,
}
impl GrantType {
	/// Returns the wire value of the grant.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::ClientCredentials => "client_credentials",
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Registered application credentials.
#[derive(Clone)]
pub struct ClientCredentials {
	/// Client ID of the application.
	pub client_id: ClientId,
	/// Client secret of the application.
	pub client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Validates the client ID and wraps both values.
	pub fn new(client_id: impl AsRef<str>, client_secret: impl Into<String>) -> Result<Self> {
		Ok(Self {
			client_id: ClientId::new(client_id).map_err(ConfigError::from)?,
			client_secret: TokenSecret::new(client_secret),
		})
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.finish()
	}
}

/// Response type requested from the authorization endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseType {
	/// Authorization code flow.
	#[default]
	Code,
	/// Implicit flow.
	Token,
}
impl ResponseType {
	/// Returns the wire value of the response type.
	pub const fn as_str(self) -> &'static str {
		match self {
			ResponseType::Code => "code",
			ResponseType::Token => "token",
		}
	}
}

/// Parameters of an authorization URL.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationRequest {
	/// Redirect URI registered for the application.
	pub redirect_uri: String,
	/// Scopes to request; joined with spaces on the wire.
	pub scopes: Vec<String>,
	/// Requested response type.
	pub response_type: ResponseType,
	/// Forces the user to re-approve the application.
	pub force_verify: bool,
	/// Caller-provided state; a random value is generated when absent.
	pub state: Option<String>,
}

/// Authorization URL plus the state value the redirect must echo back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationUrl {
	/// URL the user should visit.
	pub url: Url,
	/// State embedded in the URL.
	pub state: String,
}
impl AuthorizationUrl {
	/// Checks the `state` returned on the redirect.
	pub fn state_matches(&self, returned_state: &str) -> bool {
		self.state == returned_state
	}
}


/// Token endpoint payload.
///
/// Twitch reports `scope` as a JSON array on grants and may omit `token_type` on refreshes, so
/// the standard response shape from `oauth2` is not used.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct TokenResponse {
	access_token: AccessToken,
	#[serde(default = "bearer")]
	token_type: BasicTokenType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expires_in: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<RefreshToken>,
	#[serde(
		default,
		rename = "scope",
		deserialize_with = "scope_list",
		skip_serializing_if = "Option::is_none"
	)]
	scopes: Option<Vec<Scope>>,
}
impl TokenResponse {
	fn lifetime(&self) -> TokenLifetime {
		let expires_in = self.expires_in().map_or(Duration::ZERO, |expires_in| {
			Duration::try_from(expires_in).unwrap_or(Duration::MAX)
		});

		TokenLifetime::stamped_now(expires_in)
	}

	fn into_app_token(self) -> AppAccessToken {
		let lifetime = self.lifetime();

		AppAccessToken::new(self.access_token.into_secret(), lifetime)
	}

	fn into_user_token(self) -> Result<UserAccessToken> {
		let lifetime = self.lifetime();
		let scope = match self.scopes() {
			Some(scopes) => ScopeSet::new(scopes.iter().map(|scope| scope.as_str()))
				.map_err(ConfigError::from)?,
			None => ScopeSet::default(),
		};
		let refresh_token =
			self.refresh_token.map(RefreshToken::into_secret).unwrap_or_default();

		Ok(UserAccessToken::new(self.access_token.into_secret(), refresh_token, scope, lifetime))
	}
}
impl oauth2::TokenResponse for TokenResponse {
	type TokenType = BasicTokenType;

	fn access_token(&self) -> &AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &Self::TokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<std::time::Duration> {
		self.expires_in.map(std::time::Duration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh_token.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		self.scopes.as_ref()
	}
}

/// Client for the token API.
pub struct OAuthClient<C>
where
	C: ?Sized + HttpTransport,
{
	http: Arc<C>,
	endpoints: Endpoints,
	credentials: ClientCredentials,
}
impl<C> OAuthClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn new(
		credentials: ClientCredentials,
		endpoints: Endpoints,
		http: impl Into<Arc<C>>,
	) -> Self {
		Self { http: http.into(), endpoints, credentials }
	}

	/// Client ID of the application.
	pub fn client_id(&self) -> &ClientId {
		&self.credentials.client_id
	}

	/// Configured endpoints.
	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	/// Transport shared with the request engine.
	pub fn transport(&self) -> &Arc<C> {
		&self.http
	}

	/// Fetches a fresh app token through the client credentials grant.
	pub async fn fetch_app_access_token(&self) -> Result<AppAccessToken> {
		obs::observe(FlowKind::ClientCredentials, "fetch_app_access_token", async {
			let client = self.token_client()?;
			let handle = TokenHandle::new(self.http.clone());
			let response = client
				.exchange_client_credentials()
				.request_async(&handle)
				.await
				.map_err(|e| {
					map_request_error(GrantType::ClientCredentials, handle.take_metadata(), e)
				})?;

			Ok(response.into_app_token())
		})
		.await
	}

	/// Exchanges an authorization code for a user token.
	pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<UserAccessToken> {
		if redirect_uri.is_empty() {
			return Err(ConfigError::EmptyRedirectUri.into());
		}

		obs::observe(FlowKind::AuthorizationCode, "exchange_code", async {
			let client = self.token_client()?;
			let redirect_url =
				RedirectUrl::new(redirect_uri.to_owned()).map_err(ConfigError::from)?;
			let handle = TokenHandle::new(self.http.clone());
			let response = client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url))
				.request_async(&handle)
				.await
				.map_err(|e| {
					map_request_error(GrantType::AuthorizationCode, handle.take_metadata(), e)
				})?;

			response.into_user_token()
		})
		.await
	}

	/// Refreshes a user token.
	///
	/// The returned token carries no refresh token or scope when the server omitted them; callers
	/// holding the previous token should keep those values.
	pub async fn refresh_token(&self, refresh_token: &TokenSecret) -> Result<UserAccessToken> {
		if refresh_token.is_empty() {
			return Err(Error::EmptyRefreshToken);
		}

		obs::observe(FlowKind::Refresh, "refresh_token", async {
			let client = self.token_client()?;
			let refresh_token = RefreshToken::new(refresh_token.expose().to_owned());
			let handle = TokenHandle::new(self.http.clone());
			let response = client
				.exchange_refresh_token(&refresh_token)
				.request_async(&handle)
				.await
				.map_err(|e| {
					map_request_error(GrantType::RefreshToken, handle.take_metadata(), e)
				})?;

			response.into_user_token()
		})
		.await
	}

	/// Validates an access token and returns the server-reported metadata.
	///
	/// An invalid token fails with [`Error::UnsuccessfulRequest`] carrying status 401.
	pub async fn validate_token(&self, access_token: &TokenSecret) -> Result<TokenInfo> {
		obs::observe(FlowKind::Validate, "validate_token", async {
			let request = ApiRequest::get(self.endpoints.oauth_url("validate")?);
			let auth = Authorization {
				client_id: self.credentials.client_id.as_ref(),
				scheme: AuthScheme::OAuth,
				token: Some(access_token.expose()),
			};
			let (mut metadata, body) = http::send(&*self.http, request.to_http(Some(auth))?).await?;
			let body = http::classify(&mut metadata, body, true)?.unwrap_or_default();

			http::decode(&body, metadata.status)
		})
		.await
	}

	/// Revokes an access token.
	pub async fn revoke_token(&self, access_token: &TokenSecret) -> Result<()> {
		obs::observe(FlowKind::Revoke, "revoke_token", async {
			let request = ApiRequest::post(self.endpoints.oauth_url("revoke")?).with_form([
				("client_id", self.credentials.client_id.as_ref()),
				("token", access_token.expose()),
			]);
			let (mut metadata, body) = http::send(&*self.http, request.to_http(None)?).await?;

			http::classify(&mut metadata, body, false)?;

			Ok(())
		})
		.await
	}

	/// Builds the URL a user visits to authorize the application.
	///
	/// A random CSRF state is generated unless the request carries one.
	pub fn authorization_url(&self, request: &AuthorizationRequest) -> Result<AuthorizationUrl> {
		let client = self.token_client()?;
		let state = request.state.clone();
		let mut authorize = client
			.authorize_url(|| state.map_or_else(CsrfToken::new_random, CsrfToken::new))
			.add_scopes(request.scopes.iter().cloned().map(Scope::new));

		if !request.redirect_uri.is_empty() {
			let redirect_url =
				RedirectUrl::new(request.redirect_uri.clone()).map_err(ConfigError::from)?;

			authorize = authorize.set_redirect_uri(Cow::Owned(redirect_url));
		}
		if request.response_type == ResponseType::Token {
			authorize = authorize.use_implicit_flow();
		}
		if request.force_verify {
			authorize = authorize.add_extra_param("force_verify", "true");
		}

		let (url, state) = authorize.url();

		Ok(AuthorizationUrl { url, state: state.into_secret() })
	}

	fn token_client(&self) -> Result<TokenClient> {
		Ok(oauth2::Client::new(oauth2::ClientId::new(self.credentials.client_id.to_string()))
			.set_client_secret(oauth2::ClientSecret::new(
				self.credentials.client_secret.expose().to_owned(),
			))
			.set_auth_type(AuthType::RequestBody)
			.set_auth_uri(AuthUrl::from_url(self.endpoints.oauth_url("authorize")?))
			.set_token_uri(TokenUrl::from_url(self.endpoints.oauth_url("token")?)))
	}
}
impl<C> Debug for OAuthClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthClient")
			.field("endpoints", &self.endpoints)
			.field("credentials", &self.credentials)
			.finish_non_exhaustive()
	}
}

fn bearer() -> BasicTokenType {
	BasicTokenType::Bearer
}

fn scope_list<'de, D>(deserializer: D) -> Result<Option<Vec<Scope>>, D::Error>
where
	D: Deserializer<'de>,
{
	let scopes = ScopeSet::deserialize(deserializer)?;

	Ok((!scopes.is_empty())
		.then(|| scopes.iter().map(|scope| Scope::new(scope.to_owned())).collect()))
}

/// Maps a failed grant to the crate error.
///
/// Any answer other than 200 surfaces as [`Error::UnsuccessfulRequest`] with the Twitch error
/// envelope, whether or not `oauth2` could parse the body as an OAuth error.
fn map_request_error<E>(
	grant: GrantType,
	metadata: Option<ResponseMetadata>,
	err: TokenRequestError<E>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	if let Some(metadata) = &metadata
		&& metadata.status != 200
	{
		return Error::UnsuccessfulRequest {
			status: metadata.status,
			message: metadata.message.clone(),
		};
	}

	let status = metadata.map(|metadata| metadata.status);

	match err {
		RequestTokenError::Request(HttpClientError::Reqwest(source)) =>
			TransportError::network(*source).into(),
		RequestTokenError::Request(HttpClientError::Http(source)) =>
			ConfigError::from(source).into(),
		RequestTokenError::Request(source) => TransportError::network(source).into(),
		RequestTokenError::Parse(source, _) => Error::Decode { source, status },
		RequestTokenError::ServerResponse(response) =>
			Error::TokenEndpoint { grant, message: response.to_string(), status },
		RequestTokenError::Other(message) => Error::TokenEndpoint { grant, message, status },
	}
}
