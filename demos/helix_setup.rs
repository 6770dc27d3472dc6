//! Wires a refreshing provider into the request engine against a mocked Twitch API, then starts
//! a commercial for a broadcaster whose cached token has already expired.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use helix_broker::{
	auth::{ScopeSet, TokenLifetime, UserAccessToken, UserId},
	client::{Client, RetryConfig},
	config::Endpoints,
	helix::StartCommercialInput,
	http::ReqwestTransport,
	provider::RefreshingProviderBuilder,
	reqwest,
	time::{Duration, OffsetDateTime},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token")
				.form_urlencoded_tuple("grant_type", "refresh_token");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"fresh-access","refresh_token":"fresh","expires_in":14400}"#,
			);
		})
		.await;
	let commercial_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/helix/channels/commercial")
				.header("authorization", "Bearer fresh-access");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"data":[{"length":60,"message":"","retry_after":480}]}"#);
		})
		.await;
	let endpoints = Endpoints::builder()
		.helix(server.url("/helix"))
		.oauth(server.url("/oauth2"))
		.build()?;
	let transport = Arc::new(ReqwestTransport::with_client(
		reqwest::Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	));
	let provider = RefreshingProviderBuilder::new("demo-client", "demo-secret")
		.redirect_uri("http://localhost:3000")
		.scopes(["channel:edit:commercial"])
		.endpoints(endpoints.clone())
		.on_refresh(|user_id, token| {
			println!("Refreshed the token of {user_id}: {token:?}.");
		})
		.on_refresh_failure(|user_id, failure| {
			println!("Refreshing the token of {user_id} failed: {}.", failure.reason);
		})
		.build::<ReqwestTransport>(transport.clone())?;
	let broadcaster = UserId::new("41245072")?;

	println!("Authorize more users at {}.", provider.authorization_url(false)?.url);

	provider.add_user(
		broadcaster.clone(),
		UserAccessToken::new(
			"stale-access",
			"stale-refresh",
			ScopeSet::new(["channel:edit:commercial"])?,
			TokenLifetime::stamped_at(
				Duration::hours(4),
				OffsetDateTime::now_utc() - Duration::hours(5),
			),
		),
	)?;

	let client = Client::<ReqwestTransport>::new(Arc::new(provider), endpoints, transport)
		.with_retry_config(RetryConfig {
			retry_on_unavailable: true,
			unavailable_retry_attempts: 3,
			unavailable_retry_interval: Duration::SECOND,
			..Default::default()
		});
	let response = client
		.with_retry()
		.ads()
		.start_commercial(&StartCommercialInput { broadcaster_id: broadcaster, length: 60 })
		.await;

	println!("Status: {}.", response.metadata.status);
	println!("Output: {:?}.", response.into_result()?);

	token_mock.assert_async().await;
	commercial_mock.assert_async().await;

	Ok(())
}
