//! Endpoint configuration for the resource and token APIs.

// std
use std::net::IpAddr;
// self
use crate::_prelude::*;

/// Default resource API base URL.
pub const DEFAULT_HELIX_URL: &str = "https://api.twitch.tv/helix";
/// Default token API base URL.
pub const DEFAULT_OAUTH_URL: &str = "https://id.twitch.tv/oauth2";

/// Errors raised while constructing or validating endpoints.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum EndpointsError {
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoint is not a valid absolute URL.
	#[error("The {endpoint} endpoint is not a valid URL: {url}.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint value that failed validation.
		url: String,
	},
}

/// Base URLs of the resource API and the token API.
///
/// Deserialization runs the same validation as [`EndpointsBuilder::build`]; omitted fields fall
/// back to the public endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EndpointsBuilder")]
pub struct Endpoints {
	helix: String,
	oauth: String,
}
impl Endpoints {
	/// Returns a builder seeded with the public API endpoints.
	pub fn builder() -> EndpointsBuilder {
		EndpointsBuilder::default()
	}

	/// Base URL of the resource API, without a trailing slash.
	pub fn helix(&self) -> &str {
		&self.helix
	}

	/// Base URL of the token API, without a trailing slash.
	pub fn oauth(&self) -> &str {
		&self.oauth
	}

	/// Resolves a resource API path such as `channels/commercial`.
	pub fn helix_url(&self, resource: &str) -> Result<Url> {
		join(&self.helix, resource)
	}

	/// Resolves a token API path such as `token` or `validate`.
	pub fn oauth_url(&self, resource: &str) -> Result<Url> {
		join(&self.oauth, resource)
	}
}
impl Default for Endpoints {
	fn default() -> Self {
		Self { helix: DEFAULT_HELIX_URL.into(), oauth: DEFAULT_OAUTH_URL.into() }
	}
}

/// Builder for [`Endpoints`] values.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EndpointsBuilder {
	/// Resource API base URL.
	pub helix: String,
	/// Token API base URL.
	pub oauth: String,
}
impl EndpointsBuilder {
	/// Overrides the resource API base URL.
	pub fn helix(mut self, url: impl Into<String>) -> Self {
		self.helix = url.into();

		self
	}

	/// Overrides the token API base URL.
	pub fn oauth(mut self, url: impl Into<String>) -> Self {
		self.oauth = url.into();

		self
	}

	/// Consumes the builder and validates both endpoints.
	pub fn build(self) -> Result<Endpoints, EndpointsError> {
		Ok(Endpoints {
			helix: validate_endpoint("helix", &self.helix)?,
			oauth: validate_endpoint("oauth", &self.oauth)?,
		})
	}
}
impl TryFrom<EndpointsBuilder> for Endpoints {
	type Error = EndpointsError;

	fn try_from(builder: EndpointsBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}
impl Default for EndpointsBuilder {
	fn default() -> Self {
		Self { helix: DEFAULT_HELIX_URL.into(), oauth: DEFAULT_OAUTH_URL.into() }
	}
}

fn validate_endpoint(name: &'static str, raw: &str) -> Result<String, EndpointsError> {
	let invalid = || EndpointsError::InvalidEndpoint { endpoint: name, url: raw.to_owned() };
	let url = Url::parse(raw.trim_end_matches('/')).map_err(|_| invalid())?;

	if url.cannot_be_a_base() || url.host().is_none() {
		return Err(invalid());
	}

	match url.scheme() {
		"https" => {},
		"http" if is_loopback(&url) => {},
		_ => return Err(EndpointsError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}

	Ok(url.as_str().trim_end_matches('/').to_owned())
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.is_ok_and(|ip| ip.is_loopback()),
		None => false,
	}
}

fn join(base: &str, resource: &str) -> Result<Url> {
	let joined = format!("{base}/{}", resource.trim_start_matches('/'));

	Ok(Url::parse(&joined).map_err(crate::error::ConfigError::from)?)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_point_at_public_api() {
		let endpoints = Endpoints::default();

		assert_eq!(
			endpoints.helix_url("channels/commercial").expect("Helix URL should join.").as_str(),
			"https://api.twitch.tv/helix/channels/commercial"
		);
		assert_eq!(
			endpoints.oauth_url("/validate").expect("OAuth URL should join.").as_str(),
			"https://id.twitch.tv/oauth2/validate"
		);
	}

	#[test]
	fn builder_output_matches_default() {
		let built = Endpoints::builder().build().expect("Public endpoints should validate.");

		assert_eq!(built, Endpoints::default());
	}

	#[test]
	fn builder_rejects_plain_http_for_remote_hosts() {
		let err = Endpoints::builder()
			.helix("http://api.example.com/helix")
			.build()
			.expect_err("Plain HTTP to a remote host must be rejected.");

		assert!(matches!(err, EndpointsError::InsecureEndpoint { endpoint: "helix", .. }));
	}

	#[test]
	fn builder_accepts_loopback_test_servers() {
		let endpoints = Endpoints::builder()
			.helix("http://127.0.0.1:8080/helix/")
			.oauth("http://localhost:8081")
			.build()
			.expect("Loopback endpoints should be accepted.");

		assert_eq!(
			endpoints.helix_url("chat/badges/global").expect("Helix URL should join.").as_str(),
			"http://127.0.0.1:8080/helix/chat/badges/global"
		);
		assert_eq!(
			endpoints.oauth_url("token").expect("OAuth URL should join.").as_str(),
			"http://localhost:8081/token"
		);
	}

	#[test]
	fn builder_rejects_malformed_urls() {
		let err = Endpoints::builder()
			.oauth("not a url")
			.build()
			.expect_err("Malformed URLs must be rejected.");

		assert!(matches!(err, EndpointsError::InvalidEndpoint { endpoint: "oauth", .. }));
	}

	#[test]
	fn serde_applies_builder_validation() {
		let endpoints: Endpoints =
			serde_json::from_str(r#"{"helix":"http://localhost:8080/helix/"}"#)
				.expect("Loopback endpoints should deserialize.");

		assert_eq!(endpoints.helix(), "http://localhost:8080/helix");
		assert_eq!(endpoints.oauth(), DEFAULT_OAUTH_URL);

		let json = serde_json::to_string(&endpoints).expect("Endpoints should serialize.");

		assert_eq!(
			serde_json::from_str::<Endpoints>(&json).expect("Serialized endpoints should reload."),
			endpoints
		);

		let err = serde_json::from_str::<Endpoints>(r#"{"oauth":"http://id.example.com/oauth2"}"#)
			.expect_err("Plain HTTP to a remote host must be rejected.");

		assert!(err.to_string().contains("must use HTTPS"), "Unexpected error: {err}.");
	}
}
