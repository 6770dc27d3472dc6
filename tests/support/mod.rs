//! Shared fixtures for the reqwest-backed integration tests.

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use helix_broker::{
	auth::{ScopeSet, TokenLifetime, UserAccessToken, UserId},
	config::Endpoints,
	http::ReqwestTransport,
	reqwest::Client,
	time::{Duration, OffsetDateTime},
};

pub const CLIENT_ID: &str = "client-it";
pub const CLIENT_SECRET: &str = "secret-it";
pub const BROADCASTER_ID: &str = "41245072";

pub fn transport() -> Arc<ReqwestTransport> {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Reqwest client should build for integration tests.");

	Arc::new(ReqwestTransport::with_client(client))
}

pub fn endpoints(server: &MockServer) -> Endpoints {
	Endpoints::builder()
		.helix(server.url("/helix"))
		.oauth(server.url("/oauth2"))
		.build()
		.expect("Mock server endpoints should be accepted.")
}

pub fn broadcaster() -> UserId {
	UserId::new(BROADCASTER_ID).expect("Broadcaster ID fixture should be valid.")
}

/// User token obtained `age` ago with a one-hour lifetime.
pub fn user_token(access: &str, refresh: &str, age: Duration) -> UserAccessToken {
	UserAccessToken::new(
		access,
		refresh,
		ScopeSet::new(["channel:edit:commercial"]).expect("Scope fixture should be valid."),
		TokenLifetime::stamped_at(Duration::hours(1), OffsetDateTime::now_utc() - age),
	)
}
