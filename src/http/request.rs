//! Re-sendable request values and authorization header assembly.

// crates.io
use oauth2::{
	HttpRequest,
	http::{
		HeaderMap, HeaderName, HeaderValue, Method,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};
use url::form_urlencoded;
// self
use crate::{_prelude::*, error::ConfigError};

/// Header carrying the application's client ID on every authorized call.
pub const CLIENT_ID_HEADER: &str = "client-id";

/// Scheme placed before the token in the `Authorization` header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthScheme {
	/// `Bearer`, used by the resource API.
	#[default]
	Bearer,
	/// `OAuth`, used by the token validation endpoint.
	OAuth,
}
impl AuthScheme {
	/// Returns the header keyword for the scheme.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthScheme::Bearer => "Bearer",
			AuthScheme::OAuth => "OAuth",
		}
	}
}
impl Display for AuthScheme {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Credentials attached to one dispatch of an [`ApiRequest`].
#[derive(Clone, Copy)]
pub(crate) struct Authorization<'a> {
	pub client_id: &'a str,
	pub scheme: AuthScheme,
	pub token: Option<&'a str>,
}

/// Fully constructed request that can be dispatched any number of times.
///
/// Retries re-send the same method, URL, headers, and body; only the authorization headers are
/// recomputed per dispatch.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL, query included.
	pub url: Url,
	/// Caller-supplied headers.
	pub headers: HeaderMap,
	/// Encoded body; empty for bodiless requests.
	pub body: Vec<u8>,
}
impl ApiRequest {
	/// Creates a bodiless request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Appends query pairs to the URL.
	pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let pairs = pairs.into_iter().collect::<Vec<_>>();

		if !pairs.is_empty() {
			self.url.query_pairs_mut().extend_pairs(pairs);
		}

		self
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Encodes `body` as JSON.
	pub fn with_json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		self.body = serde_json::to_vec(body).map_err(ConfigError::RequestEncode)?;
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Encodes `pairs` as an `application/x-www-form-urlencoded` body.
	pub fn with_form<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		self.body =
			form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish().into_bytes();
		self.headers
			.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));

		self
	}

	/// Builds the transport request, attaching credentials when provided.
	pub(crate) fn to_http(&self, auth: Option<Authorization<'_>>) -> Result<HttpRequest> {
		let mut builder = oauth2::http::Request::builder()
			.method(self.method.clone())
			.uri(self.url.as_str());

		for (name, value) in &self.headers {
			builder = builder.header(name, value);
		}

		if let Some(auth) = auth {
			builder = builder.header(CLIENT_ID_HEADER, auth.client_id);

			if let Some(token) = auth.token {
				builder = builder.header(AUTHORIZATION, format!("{} {token}", auth.scheme));
			}
		}

		Ok(builder.body(self.body.clone()).map_err(ConfigError::from)?)
	}
}
