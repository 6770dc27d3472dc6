//! Request engine: token resolution, dispatch, and retry policies for resource API calls.
//!
//! [`Client`] is a cheap value. Per-call variations (`with_retry`, `as_user`, cancellation)
//! produce modified copies and never touch the value they were derived from; the provider is the
//! only state shared between copies.
//!
//! One logical call runs as follows:
//!
//! 1. Resolve a token per the [`AuthRequirement`]. A token that carries a refresh token and is
//!    known to be expired is refreshed before the first dispatch.
//! 2. Attach `Client-Id` and `Authorization` and dispatch. Transport failures end the call.
//! 3. Apply at most one policy to the response:
//!    - 401: re-fetch the app token (no refresh token) or refresh the user token, then retry
//!      once.
//!    - 429: wait until the rate-limit reset, then retry once; fail with
//!      [`Error::RetryTimeoutExceeded`] when the wait meets the configured ceiling.
//!    - 503: retry at a fixed interval until the configured number of tries is spent.
//! 4. Classify the final response and decode the payload.

pub mod requirement;
pub mod retry;

pub use requirement::*;
pub use retry::*;

// crates.io
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Freshness, UserAccessToken, UserId},
	config::Endpoints,
	http::{self, ApiRequest, Authorization, HttpTransport, ResponseMetadata},
	obs::{self, FlowKind, RetryReason},
	provider::AuthProvider,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

type Response = (ResponseMetadata, Vec<u8>);

/// Decoded payload of a call plus the metadata of its final response.
///
/// Metadata is present even when the call failed; it stays at its default when the call failed
/// before any response arrived.
#[derive(Debug)]
pub struct ApiResponse<T> {
	/// Status, headers, and error envelope of the final response.
	pub metadata: ResponseMetadata,
	/// Decoded payload or the error that ended the call.
	pub payload: Result<T>,
}
impl<T> ApiResponse<T> {
	/// Drops the metadata.
	pub fn into_result(self) -> Result<T> {
		self.payload
	}

	/// Maps a successful payload.
	pub fn map<U, F>(self, f: F) -> ApiResponse<U>
	where
		F: FnOnce(T) -> U,
	{
		ApiResponse { metadata: self.metadata, payload: self.payload.map(f) }
	}
}

/// Request engine for the resource API.
pub struct Client<C>
where
	C: ?Sized + HttpTransport,
{
	http: Arc<C>,
	provider: Arc<dyn AuthProvider>,
	endpoints: Endpoints,
	retry: RetryConfig,
	user_context: Option<UserId>,
	cancellation: Option<CancellationToken>,
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
	/// Creates a client for the public API over a default reqwest transport.
	pub fn with_reqwest(provider: Arc<dyn AuthProvider>) -> Self {
		Self::new(provider, Endpoints::default(), ReqwestTransport::default())
	}
}
impl<C> Client<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client with retries disabled apart from the 401 policy.
	pub fn new(
		provider: Arc<dyn AuthProvider>,
		endpoints: Endpoints,
		http: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http: http.into(),
			provider,
			endpoints,
			retry: RetryConfig::default(),
			user_context: None,
			cancellation: None,
		}
	}

	/// Provider resolving tokens for this client.
	pub fn provider(&self) -> &Arc<dyn AuthProvider> {
		&self.provider
	}

	/// Configured endpoints.
	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	/// Effective retry configuration.
	pub fn retry_config(&self) -> &RetryConfig {
		&self.retry
	}

	/// User whose token app-or-user calls prefer, if any.
	pub fn user_context(&self) -> Option<&UserId> {
		self.user_context.as_ref()
	}

	/// Copy with every retry policy enabled.
	pub fn with_retry(&self) -> Self {
		let mut client = self.clone();

		client.retry.retry_all = true;

		client
	}

	/// Copy using `config`, finalized.
	pub fn with_retry_config(&self, config: RetryConfig) -> Self {
		let mut client = self.clone();

		client.retry = config.finalize();

		client
	}

	/// Copy whose app-or-user calls prefer the token of `user_id`.
	pub fn as_user(&self, user_id: UserId) -> Self {
		let mut client = self.clone();

		client.user_context = Some(user_id);

		client
	}

	/// Runs `f` with a copy acting as `user_id`.
	pub async fn with_user<F, Fut, T>(&self, user_id: UserId, f: F) -> T
	where
		F: FnOnce(Self) -> Fut,
		Fut: Future<Output = T>,
	{
		f(self.as_user(user_id)).await
	}

	/// Copy whose calls abort with [`Error::Cancelled`] once `token` is cancelled.
	pub fn with_cancellation(&self, token: CancellationToken) -> Self {
		let mut client = self.clone();

		client.cancellation = Some(token);

		client
	}

	/// Executes `request` and decodes the JSON payload of the final response.
	///
	/// A 204 fails with [`Error::NoContentButDestinationExpected`].
	pub async fn do_request<T>(
		&self,
		request: &ApiRequest,
		auth: &AuthRequirement,
	) -> ApiResponse<T>
	where
		T: DeserializeOwned,
	{
		let (metadata, outcome) = self.execute(request, auth, true).await;
		let payload =
			outcome.and_then(|body| http::decode(&body.unwrap_or_default(), metadata.status));

		ApiResponse { metadata, payload }
	}

	/// Executes `request` and discards any payload.
	pub async fn do_request_empty(
		&self,
		request: &ApiRequest,
		auth: &AuthRequirement,
	) -> ApiResponse<()> {
		let (metadata, outcome) = self.execute(request, auth, false).await;

		ApiResponse { metadata, payload: outcome.map(|_| ()) }
	}

	async fn execute(
		&self,
		request: &ApiRequest,
		auth: &AuthRequirement,
		expects_payload: bool,
	) -> (ResponseMetadata, Result<Option<Vec<u8>>>) {
		let mut metadata = ResponseMetadata::default();
		let outcome = obs::observe(
			FlowKind::ApiCall,
			"do_request",
			self.run(request, auth, expects_payload, &mut metadata),
		)
		.await;

		(metadata, outcome)
	}

	async fn run(
		&self,
		request: &ApiRequest,
		auth: &AuthRequirement,
		expects_payload: bool,
		metadata: &mut ResponseMetadata,
	) -> Result<Option<Vec<u8>>> {
		let (token, user_id) = self.resolve(auth).await?;
		let response = self.send(request, token.as_ref()).await?;
		let response = match (response.0.status, token) {
			(401, Some(token)) => {
				record(metadata, &response);

				let token = self.reauthorize(&token, user_id.as_ref()).await?;

				obs::record_retry(RetryReason::Unauthorized, Duration::ZERO);

				self.send(request, Some(&token)).await?
			},
			(429, token) if self.retry.retries_rate_limit() => {
				record(metadata, &response);

				let wait = response.0.rate_limit_wait_at(OffsetDateTime::now_utc());

				if self.retry.exceeds_max_wait(wait) {
					return Err(Error::RetryTimeoutExceeded {
						wait,
						max: self.retry.max_rate_limit_wait,
					});
				}

				obs::record_retry(RetryReason::RateLimited, wait);
				self.sleep(wait).await?;

				self.send(request, token.as_ref()).await?
			},
			(503, token) if self.retry.retries_unavailable() =>
				self.retry_unavailable(request, token.as_ref(), response, metadata).await?,
			_ => response,
		};
		let (mut last, body) = response;
		let outcome = http::classify(&mut last, body, expects_payload);

		*metadata = last;

		outcome
	}

	async fn retry_unavailable(
		&self,
		request: &ApiRequest,
		token: Option<&AccessToken>,
		mut response: Response,
		metadata: &mut ResponseMetadata,
	) -> Result<Response> {
		let interval = self.retry.unavailable_retry_interval;
		let mut tries = 1;

		while response.0.status == 503 && tries < self.retry.unavailable_retry_attempts {
			record(metadata, &response);
			obs::record_retry(RetryReason::Unavailable, interval);
			self.sleep(interval).await?;

			response = self.send(request, token).await?;
			tries += 1;
		}

		Ok(response)
	}

	async fn resolve(
		&self,
		auth: &AuthRequirement,
	) -> Result<(Option<AccessToken>, Option<UserId>)> {
		match auth {
			AuthRequirement::Anonymous => Ok((None, None)),
			AuthRequirement::User { user_id, scopes } if !scopes.is_empty() => {
				let user_id = user_id.as_ref().ok_or(Error::NoUserIdForScopes)?;
				let scopes = scopes.iter().map(String::as_str).collect::<Vec<_>>();
				let mut token = self.provider.user_access_token(user_id, &scopes).await?;

				if needs_refresh(&token.clone().into()) {
					token = self.refresh_user(Some(user_id)).await?;
				}

				Ok((Some(token.into()), Some(user_id.clone())))
			},
			AuthRequirement::User { user_id, .. } | AuthRequirement::AppOrUser { user_id } => {
				let user_id = self.user_context.as_ref().or(user_id.as_ref());
				let mut token = self.provider.any_access_token(user_id).await?;

				if needs_refresh(&token) {
					token = self.refresh_user(user_id).await?.into();
				}

				Ok((Some(token), user_id.cloned()))
			},
		}
	}

	async fn reauthorize(
		&self,
		token: &AccessToken,
		user_id: Option<&UserId>,
	) -> Result<AccessToken> {
		match token.refresh_token() {
			None => Ok(self.provider.app_access_token(true).await?.into()),
			Some(_) => Ok(self.refresh_user(user_id).await?.into()),
		}
	}

	async fn refresh_user(&self, user_id: Option<&UserId>) -> Result<UserAccessToken> {
		let refresher = self.provider.as_refresher().ok_or(Error::NotARefresher)?;
		let user_id = user_id.ok_or_else(|| Error::user_not_found(""))?;

		refresher.refresh_user_access_token(user_id).await
	}

	async fn send(&self, request: &ApiRequest, token: Option<&AccessToken>) -> Result<Response> {
		let auth = token.map(|token| Authorization {
			client_id: self.provider.client_id(),
			scheme: self.provider.authorization_scheme(),
			token: Some(token.access_token().expose()),
		});
		let request = request.to_http(auth)?;

		self.cancellable(http::send(&*self.http, request)).await?
	}

	async fn sleep(&self, wait: Duration) -> Result<()> {
		let wait = std::time::Duration::try_from(wait).unwrap_or_default();

		if wait.is_zero() {
			return Ok(());
		}

		self.cancellable(tokio::time::sleep(wait)).await
	}

	async fn cancellable<F>(&self, fut: F) -> Result<F::Output>
	where
		F: Future,
	{
		match &self.cancellation {
			Some(token) => tokio::select! {
				biased;
				_ = token.cancelled() => Err(Error::Cancelled),
				output = fut => Ok(output),
			},
			None => Ok(fut.await),
		}
	}
}
impl<C> Clone for Client<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			http: self.http.clone(),
			provider: self.provider.clone(),
			endpoints: self.endpoints.clone(),
			retry: self.retry,
			user_context: self.user_context.clone(),
			cancellation: self.cancellation.clone(),
		}
	}
}
impl<C> Debug for Client<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("client_id", &self.provider.client_id())
			.field("endpoints", &self.endpoints)
			.field("retry", &self.retry)
			.field("user_context", &self.user_context)
			.finish_non_exhaustive()
	}
}

fn needs_refresh(token: &AccessToken) -> bool {
	token.refresh_token().is_some() && token.lifetime().freshness() == Freshness::Expired
}

fn record(metadata: &mut ResponseMetadata, (last, body): &Response) {
	*metadata = last.clone();

	metadata.record_error_envelope(body);
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::mpsc;
	// crates.io
	use serde_json::Value;
	// self
	use super::*;
	use crate::{
		_preludet::{Recorded, Reply, ScriptedTransport},
		auth::{AppAccessToken, ScopeSet, TokenLifetime},
		oauth::ClientCredentials,
		provider::{AppTokenProvider, RefreshingProvider, RefreshingProviderBuilder, StaticProvider},
	};

	const TOKEN_PATH: &str = "/oauth2/token";
	const BADGES_PATH: &str = "/helix/chat/badges/global";

	fn user() -> UserId {
		UserId::new("141981764").expect("User ID fixture should be valid.")
	}

	fn badges() -> ApiRequest {
		let url = Endpoints::default()
			.helix_url("chat/badges/global")
			.expect("Resource URL fixture should resolve.");

		ApiRequest::get(url)
	}

	fn user_token(access: &str, lifetime: TokenLifetime) -> UserAccessToken {
		UserAccessToken::new(
			access,
			"user-refresh",
			ScopeSet::new(["chat:read"]).expect("Scope fixture should be valid."),
			lifetime,
		)
	}

	fn client<P>(provider: P, transport: &Arc<ScriptedTransport>) -> Client<ScriptedTransport>
	where
		P: 'static + AuthProvider,
	{
		Client::new(Arc::new(provider), Endpoints::default(), transport.clone())
	}

	fn static_client(
		handler: impl 'static + Fn(&Recorded, usize) -> Reply + Send + Sync,
	) -> (Arc<ScriptedTransport>, Client<ScriptedTransport>) {
		let transport = Arc::new(ScriptedTransport::new(handler));
		let app = AppAccessToken::new("app-token", TokenLifetime::stamped_now(Duration::hours(1)));

		(transport.clone(), client(StaticProvider::new("client", app), &transport))
	}

	fn app_token_client(
		helix: impl 'static + Fn(usize) -> Reply + Send + Sync,
	) -> (Arc<ScriptedTransport>, Client<ScriptedTransport>) {
		let transport = Arc::new(ScriptedTransport::new(move |recorded, call| {
			match recorded.path.as_str() {
				TOKEN_PATH => {
					let body = format!(r#"{{"access_token":"app-{call}","expires_in":3600}}"#);

					Reply::json(200, &body)
				},
				_ => helix(call),
			}
		}));
		let credentials =
			ClientCredentials::new("client", "secret").expect("Credentials should be valid.");
		let provider = AppTokenProvider::<ScriptedTransport>::new(
			credentials,
			Endpoints::default(),
			transport.clone(),
		);

		(transport.clone(), client(provider, &transport))
	}

	fn refreshing_provider(
		transport: &Arc<ScriptedTransport>,
	) -> RefreshingProvider<ScriptedTransport> {
		let provider = RefreshingProviderBuilder::new("client", "secret")
			.build::<ScriptedTransport>(transport.clone())
			.expect("Provider should build.");
		let token = user_token("user-access", TokenLifetime::stamped_now(Duration::hours(4)));

		provider.add_user(user(), token).expect("Fixture user should be accepted.");

		provider
	}

	fn authorizations(transport: &ScriptedTransport, path: &str) -> Vec<Option<String>> {
		transport
			.requests()
			.into_iter()
			.filter(|recorded| recorded.path == path)
			.map(|recorded| recorded.authorization)
			.collect()
	}

	fn rate_limited_for(seconds: i64) -> Reply {
		let reset = OffsetDateTime::now_utc() + Duration::seconds(seconds);

		Reply::json(429, r#"{"error":"Too Many Requests","status":429,"message":""}"#)
			.with_header("ratelimit-reset", reset.unix_timestamp())
	}

	#[tokio::test]
	async fn anonymous_calls_carry_no_credentials() {
		let (transport, client) = static_client(|_, _| Reply::json(200, r#"{"data":[]}"#));
		let response =
			client.do_request::<Value>(&badges(), &AuthRequirement::Anonymous).await;

		assert_eq!(response.metadata.status, 200);
		assert_eq!(
			response.into_result().expect("Anonymous call should succeed."),
			serde_json::json!({ "data": [] })
		);
		assert_eq!(authorizations(&transport, BADGES_PATH), vec![None]);
	}

	#[tokio::test]
	async fn unauthorized_app_token_is_refetched_once() {
		let (transport, client) = app_token_client(|call| match call {
			1 => Reply::json(401, r#"{"error":"Unauthorized","status":401,"message":"Invalid"}"#),
			_ => Reply::json(200, r#"{"data":[]}"#),
		});
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert!(response.payload.is_ok());
		assert_eq!(transport.calls_to(TOKEN_PATH), 2);
		assert_eq!(
			authorizations(&transport, BADGES_PATH),
			vec![Some("Bearer app-1".into()), Some("Bearer app-2".into())]
		);
	}

	#[tokio::test]
	async fn second_unauthorized_is_final() {
		let (transport, client) = app_token_client(|_| Reply::json(401, "{}"));
		let client = client.with_retry();
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert!(matches!(response.payload, Err(Error::UnsuccessfulRequest { status: 401, .. })));
		assert_eq!(response.metadata.status, 401);
		assert_eq!(transport.calls_to(BADGES_PATH), 2);
	}

	#[tokio::test]
	async fn unauthorized_user_token_is_refreshed_once() {
		let transport = Arc::new(ScriptedTransport::new(|recorded, call| {
			match (recorded.path.as_str(), call) {
				(TOKEN_PATH, _) =>
					Reply::json(200, r#"{"access_token":"new-access","expires_in":14400}"#),
				(_, 1) => Reply::json(401, "{}"),
				_ => Reply::json(200, r#"{"data":[]}"#),
			}
		}));
		let client = client(refreshing_provider(&transport), &transport);
		let auth = AuthRequirement::user(user(), ["chat:read"]);
		let response = client.do_request::<Value>(&badges(), &auth).await;

		assert!(response.payload.is_ok());
		assert_eq!(transport.calls_to(TOKEN_PATH), 1);
		assert_eq!(
			authorizations(&transport, BADGES_PATH),
			vec![Some("Bearer user-access".into()), Some("Bearer new-access".into())]
		);
	}

	#[tokio::test]
	async fn failed_reauthorization_keeps_the_unauthorized_metadata() {
		let transport = Arc::new(ScriptedTransport::new(|recorded, _| {
			match recorded.path.as_str() {
				TOKEN_PATH =>
					Reply::json(400, r#"{"status":400,"message":"Invalid refresh token"}"#),
				_ => Reply::json(
					401,
					r#"{"error":"Unauthorized","status":401,"message":"Invalid OAuth token"}"#,
				),
			}
		}));
		let client = client(refreshing_provider(&transport), &transport);
		let auth = AuthRequirement::user(user(), ["chat:read"]);
		let response = client.do_request::<Value>(&badges(), &auth).await;

		assert!(matches!(response.payload, Err(Error::UnsuccessfulRequest { status: 400, .. })));
		assert_eq!(response.metadata.status, 401);
		assert_eq!(response.metadata.message.as_deref(), Some("Invalid OAuth token"));
		assert_eq!(transport.calls_to(TOKEN_PATH), 1);
		assert_eq!(transport.calls_to(BADGES_PATH), 1);
	}

	#[tokio::test]
	async fn stalled_refresh_handler_never_delays_the_call() {
		let (release, gate) = mpsc::channel::<()>();
		let (entered, handler_started) = mpsc::channel();
		let gate = Mutex::new(gate);
		let transport = Arc::new(ScriptedTransport::new(|recorded, call| {
			match (recorded.path.as_str(), call) {
				(TOKEN_PATH, _) =>
					Reply::json(200, r#"{"access_token":"new-access","expires_in":14400}"#),
				(_, 1) => Reply::json(401, "{}"),
				_ => Reply::json(200, r#"{"data":[]}"#),
			}
		}));
		let provider = RefreshingProviderBuilder::new("client", "secret")
			.on_refresh(move |_, _| {
				let _ = entered.send(());
				let _ = gate.lock().recv_timeout(std::time::Duration::from_secs(5));

				panic!("Refresh handler failed after stalling.");
			})
			.build::<ScriptedTransport>(transport.clone())
			.expect("Provider should build.");

		let token = user_token("user-access", TokenLifetime::stamped_now(Duration::hours(4)));

		provider.add_user(user(), token).expect("Fixture user should be accepted.");

		let client = client(provider, &transport);
		let request = badges();
		let auth = AuthRequirement::user(user(), ["chat:read"]);
		let response = tokio::time::timeout(
			std::time::Duration::from_secs(2),
			client.do_request::<Value>(&request, &auth),
		)
		.await
		.expect("Call must not wait for the refresh handler.");

		assert!(response.payload.is_ok());
		assert_eq!(transport.calls_to(TOKEN_PATH), 1);

		handler_started
			.recv_timeout(std::time::Duration::from_secs(5))
			.expect("Refresh handler should have started.");

		let _ = release.send(());
	}

	#[tokio::test]
	async fn user_context_prefers_the_user_token() {
		let transport = Arc::new(ScriptedTransport::new(|recorded, _| {
			match recorded.path.as_str() {
				TOKEN_PATH => Reply::json(200, r#"{"access_token":"app","expires_in":3600}"#),
				_ => Reply::json(200, r#"{"data":[]}"#),
			}
		}));
		let client = client(refreshing_provider(&transport), &transport);
		let auth = AuthRequirement::app_or_user();

		client
			.with_user(user(), |client| async move {
				client.do_request::<Value>(&badges(), &auth).await.into_result()
			})
			.await
			.expect("Contextual call should succeed.");
		client
			.do_request::<Value>(&badges(), &AuthRequirement::app_or_user())
			.await
			.into_result()
			.expect("App call should succeed.");

		assert!(client.user_context().is_none());
		assert_eq!(
			authorizations(&transport, BADGES_PATH),
			vec![Some("Bearer user-access".into()), Some("Bearer app".into())]
		);
	}

	#[tokio::test]
	async fn concurrent_user_and_unscoped_calls_keep_their_tokens() {
		let transport = Arc::new(
			ScriptedTransport::new(|recorded, _| match recorded.path.as_str() {
				TOKEN_PATH => Reply::json(200, r#"{"access_token":"app","expires_in":3600}"#),
				_ => Reply::json(200, r#"{"data":[]}"#),
			})
			.with_latency(std::time::Duration::from_millis(20)),
		);
		let client = client(refreshing_provider(&transport), &transport);
		let acting = client.as_user(user());
		let request = badges();
		let auth = AuthRequirement::app_or_user();
		let (scoped, unscoped) = tokio::join!(
			acting.do_request::<Value>(&request, &auth),
			client.do_request::<Value>(&request, &auth)
		);
		let mut seen = authorizations(&transport, BADGES_PATH);

		seen.sort();

		assert!(scoped.payload.is_ok());
		assert!(unscoped.payload.is_ok());
		assert!(client.user_context().is_none());
		assert_eq!(seen, vec![Some("Bearer app".into()), Some("Bearer user-access".into())]);
	}

	#[tokio::test(start_paused = true)]
	async fn rate_limited_call_waits_for_reset() {
		let (transport, client) = static_client(|_, call| match call {
			1 => rate_limited_for(5),
			_ => Reply::json(200, r#"{"data":[]}"#),
		});
		let started = tokio::time::Instant::now();
		let client = client.with_retry();
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert!(response.payload.is_ok());
		assert!(started.elapsed() >= std::time::Duration::from_secs(4));
		assert_eq!(transport.calls_to(BADGES_PATH), 2);
	}

	#[tokio::test]
	async fn rate_limit_beyond_ceiling_fails_without_waiting() {
		let (transport, client) = static_client(|_, _| rate_limited_for(60));
		let client = client.with_retry_config(RetryConfig {
			retry_on_rate_limit: true,
			max_rate_limit_wait: Duration::seconds(5),
			..Default::default()
		});
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert!(matches!(response.payload, Err(Error::RetryTimeoutExceeded { .. })));
		assert_eq!(response.metadata.status, 429);
		assert_eq!(response.metadata.error.as_deref(), Some("Too Many Requests"));
		assert_eq!(transport.calls_to(BADGES_PATH), 1);
	}

	#[tokio::test]
	async fn rate_limit_without_retry_is_final() {
		let (transport, client) = static_client(|_, _| rate_limited_for(1));
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert!(matches!(response.payload, Err(Error::UnsuccessfulRequest { status: 429, .. })));
		assert_eq!(transport.calls_to(BADGES_PATH), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn unavailable_retries_spend_total_tries() {
		let (transport, client) = static_client(|_, _| Reply::json(503, "{}"));
		let client = client.with_retry_config(RetryConfig {
			retry_on_unavailable: true,
			unavailable_retry_attempts: 3,
			..Default::default()
		});
		let started = tokio::time::Instant::now();
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert!(matches!(response.payload, Err(Error::UnsuccessfulRequest { status: 503, .. })));
		assert_eq!(transport.calls_to(BADGES_PATH), 3);
		assert!(started.elapsed() >= std::time::Duration::from_secs(2));
	}

	#[tokio::test(start_paused = true)]
	async fn unavailable_call_recovers() {
		let (transport, client) = static_client(|_, call| match call {
			1 => Reply::json(503, "{}"),
			_ => Reply::json(200, r#"{"data":[]}"#),
		});
		let client = client.with_retry_config(RetryConfig {
			retry_all: true,
			unavailable_retry_attempts: 5,
			unavailable_retry_interval: NO_RETRY_INTERVAL,
			..Default::default()
		});
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert_eq!(response.metadata.status, 200);
		assert!(response.payload.is_ok());
		assert_eq!(transport.calls_to(BADGES_PATH), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn default_retry_redispatches_unavailable_once() {
		let (transport, client) = static_client(|_, call| match call {
			1 => Reply::json(503, r#"{"error":"Service Unavailable","status":503,"message":""}"#),
			_ => Reply::json(200, r#"{"data":[]}"#),
		});
		let client = client.with_retry();
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert_eq!(response.metadata.status, 200);
		assert!(response.payload.is_ok());
		assert_eq!(transport.calls_to(BADGES_PATH), 2);
	}

	#[tokio::test]
	async fn unavailable_without_retry_is_final() {
		let (transport, client) = static_client(|_, _| Reply::json(503, "{}"));
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert!(matches!(response.payload, Err(Error::UnsuccessfulRequest { status: 503, .. })));
		assert_eq!(transport.calls_to(BADGES_PATH), 1);
	}

	#[test]
	fn derived_copies_leave_the_original_untouched() {
		let (_, client) = static_client(|_, _| Reply::empty(204));
		let retrying = client.with_retry();
		let twice = retrying.with_retry();
		let acting = client.as_user(user());

		assert!(!client.retry_config().retry_all);
		assert_eq!(retrying.retry_config(), twice.retry_config());
		assert!(client.user_context().is_none());
		assert_eq!(acting.user_context(), Some(&user()));
	}

	#[tokio::test]
	async fn scopes_without_user_fail_before_dispatch() {
		let (transport, client) = static_client(|_, _| Reply::empty(204));
		let auth = AuthRequirement::User { user_id: None, scopes: vec!["chat:read".into()] };
		let response = client.do_request_empty(&badges(), &auth).await;

		assert!(matches!(response.payload, Err(Error::NoUserIdForScopes)));
		assert_eq!(response.metadata.status, 0);
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn cancelled_client_never_dispatches() {
		let (transport, client) = static_client(|_, _| Reply::empty(204));
		let token = CancellationToken::new();

		token.cancel();

		let response = client
			.with_cancellation(token)
			.do_request_empty(&badges(), &AuthRequirement::app_or_user())
			.await;

		assert!(matches!(response.payload, Err(Error::Cancelled)));
		assert!(transport.requests().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn cancellation_interrupts_rate_limit_wait() {
		let (transport, client) = static_client(|_, _| rate_limited_for(60));
		let token = CancellationToken::new();
		let client = client.with_retry().with_cancellation(token.clone());
		let canceller = tokio::spawn(async move {
			tokio::time::sleep(std::time::Duration::from_secs(1)).await;
			token.cancel();
		});
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		canceller.await.expect("Canceller should finish.");

		assert!(matches!(response.payload, Err(Error::Cancelled)));
		assert_eq!(response.metadata.status, 429);
		assert_eq!(transport.calls_to(BADGES_PATH), 1);
	}

	#[tokio::test]
	async fn transport_failures_are_not_retried() {
		let transport = Arc::new(
			ScriptedTransport::new(|_, _| Reply::json(200, "{}")).with_connection_failures(1),
		);
		let app = AppAccessToken::new("app-token", TokenLifetime::stamped_now(Duration::hours(1)));
		let client = client(StaticProvider::new("client", app), &transport).with_retry();
		let response = client.do_request::<Value>(&badges(), &AuthRequirement::app_or_user()).await;

		assert!(matches!(response.payload, Err(Error::Transport(_))));
		assert_eq!(transport.requests().len(), 1);
	}

	#[tokio::test]
	async fn no_content_depends_on_destination() {
		let (_, client) = static_client(|_, _| Reply::empty(204));
		let auth = AuthRequirement::app_or_user();
		let decoded = client.do_request::<Value>(&badges(), &auth).await;
		let empty = client.do_request_empty(&badges(), &auth).await;

		assert!(matches!(decoded.payload, Err(Error::NoContentButDestinationExpected)));
		assert_eq!(empty.metadata.status, 204);
		assert!(empty.payload.is_ok());
	}

	#[tokio::test]
	async fn expired_static_user_token_needs_a_refresher() {
		let transport = Arc::new(ScriptedTransport::new(|_, _| Reply::empty(204)));
		let obtained = OffsetDateTime::now_utc() - Duration::hours(2);
		let token = user_token("stale", TokenLifetime::stamped_at(Duration::hours(1), obtained));
		let provider = StaticProvider::new("client", token).with_user(user());
		let client = client(provider, &transport).as_user(user());
		let response =
			client.do_request_empty(&badges(), &AuthRequirement::app_or_user()).await;

		assert!(matches!(response.payload, Err(Error::NotARefresher)));
		assert!(transport.requests().is_empty());
	}
}
