//! Crate-level error types shared by the provider, the request engine, and the token API.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS). Never retried by the request engine.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured decoding failure, including the JSON path that failed.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: Option<u16>,
	},

	/// Server answered with a status outside the handled retry classes.
	#[error("Request failed with HTTP status {status}{}.", fmt_message(.message))]
	UnsuccessfulRequest {
		/// HTTP status code returned by the server.
		status: u16,
		/// Server-supplied message from the error envelope, if any.
		message: Option<String>,
	},
	/// Rate-limit reset lies further away than the configured maximum wait.
	#[error("Rate-limit reset in {wait} meets or exceeds the maximum wait of {max}.")]
	RetryTimeoutExceeded {
		/// Wait required until the server-side reset.
		wait: Duration,
		/// Configured maximum wait.
		max: Duration,
	},
	/// User is not registered in the provider.
	#[error("User `{user_id}` is not registered in the provider.")]
	UserNotFound {
		/// Identifier that was looked up.
		user_id: String,
	},
	/// Token carries no refresh token.
	#[error("Refresh token is empty.")]
	EmptyRefreshToken,
	/// Cached token was not granted a required scope.
	#[error("Token lacks the required scope `{scope}`.")]
	MissingScope {
		/// First requested scope that the token does not satisfy.
		scope: String,
	},
	/// Scopes were requested without naming the user that should grant them.
	#[error("Scopes were requested but no user ID was provided.")]
	NoUserIdForScopes,
	/// Token cannot be used in the requested context.
	#[error("Access token is not suitable for this context.")]
	UnsuitableToken,
	/// Server returned 204 although the caller expected a payload.
	#[error("Server returned no content but a response payload was expected.")]
	NoContentButDestinationExpected,
	/// Provider cannot refresh user tokens.
	#[error("Provider cannot refresh user access tokens.")]
	NotARefresher,
	/// Token endpoint answered a grant in a shape that carries no usable token.
	#[error("Token endpoint returned an unexpected response to the {grant} grant: {message}.")]
	TokenEndpoint {
		/// Grant that was requested.
		grant: crate::oauth::GrantType,
		/// Description of the unexpected response.
		message: String,
		/// HTTP status code of the response, if one arrived.
		status: Option<u16>,
	},
	/// Call was cancelled while in flight or waiting for a retry.
	#[error("Request was cancelled.")]
	Cancelled,
}
impl Error {
	/// HTTP status attached to the error, when the server answered.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::UnsuccessfulRequest { status, .. } => Some(*status),
			Self::Decode { status, .. } | Self::TokenEndpoint { status, .. } => *status,
			_ => None,
		}
	}

	pub(crate) fn user_not_found(user_id: impl Display) -> Self {
		Self::UserNotFound { user_id: user_id.to_string() }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Request payload could not be encoded.
	#[error("Request payload could not be encoded.")]
	RequestEncode(#[source] serde_json::Error),
	/// Endpoint configuration is invalid.
	#[error(transparent)]
	Endpoints(#[from] crate::config::EndpointsError),
	/// Request URL could not be assembled from the configured endpoints.
	#[error("Request URL is invalid.")]
	InvalidUrl(#[from] url::ParseError),
	/// Redirect URI is required for the authorization code grant.
	#[error("Redirect URI is empty.")]
	EmptyRedirectUri,
	/// Scopes cannot be normalized.
	#[error("Scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Identifier validation failed.
	#[error("Identifier is invalid.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
}

/// Transport-level failures (DNS, TCP, TLS, and I/O).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client failed before a response arrived.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

fn fmt_message(message: &Option<String>) -> String {
	match message {
		Some(message) if !message.is_empty() => format!(": {message}"),
		_ => String::new(),
	}
}
