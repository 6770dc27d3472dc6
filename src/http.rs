//! Transport seam for every outbound call plus per-call response metadata.
//!
//! The crate's only dependency on an HTTP stack is [`HttpTransport`]: it receives a fully built
//! request and resolves with a response or a transport-level error. Status codes are never
//! treated as transport failures; classification happens in [`classify`] so the request engine
//! and the token API helpers share one notion of success, error envelopes, and status ceilings.

pub mod metadata;
pub mod request;

pub use metadata::*;
pub use request::*;

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::TransportError};

/// Highest status for which the error envelope is decoded.
pub const MAX_DECODED_STATUS: u16 = 599;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute one request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by a provider
/// and any number of client copies, and the futures they return must be `Send` so calls can hop
/// executors. A response with any status, including 4xx and 5xx, is a successful execution; the
/// error type is reserved for connection-level failures, which are never retried.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes the request and resolves with the raw response.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints return results directly, so a custom [`ReqwestClient`] should be configured
/// not to follow redirects.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	type TransportError = ReqwestError;

	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
		Box::pin(async move {
			let response = self.0.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// [`AsyncHttpClient`] handle that runs `oauth2` token grants over an [`HttpTransport`].
///
/// Each grant gets its own handle. The handle keeps the metadata of the last response, error
/// envelope included, so a rejected grant can still report the Twitch status and message.
pub(crate) struct TokenHandle<C>
where
	C: ?Sized + HttpTransport,
{
	transport: Arc<C>,
	metadata: Mutex<Option<ResponseMetadata>>,
}
impl<C> TokenHandle<C>
where
	C: ?Sized + HttpTransport,
{
	pub(crate) fn new(transport: Arc<C>) -> Self {
		Self { transport, metadata: Mutex::new(None) }
	}

	/// Returns the metadata captured from the last response, consuming it.
	pub(crate) fn take_metadata(&self) -> Option<ResponseMetadata> {
		self.metadata.lock().take()
	}
}
impl<'c, C> AsyncHttpClient<'c> for TokenHandle<C>
where
	C: ?Sized + HttpTransport,
{
	type Error = HttpClientError<C::TransportError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.metadata.lock().take();

			let response = self.transport.execute(request).await.map_err(Box::new)?;
			let mut metadata =
				ResponseMetadata::new(response.status().as_u16(), response.headers().to_owned());

			if (300..=MAX_DECODED_STATUS).contains(&metadata.status) {
				metadata.record_error_envelope(response.body());
			}

			*self.metadata.lock() = Some(metadata);

			Ok(response)
		})
	}
}

/// Executes one request and splits the response into metadata and body.
pub(crate) async fn send<C>(
	transport: &C,
	request: HttpRequest,
) -> Result<(ResponseMetadata, Vec<u8>)>
where
	C: ?Sized + HttpTransport,
{
	let response = transport.execute(request).await.map_err(TransportError::network)?;
	let (parts, body) = response.into_parts();

	Ok((ResponseMetadata::new(parts.status.as_u16(), parts.headers), body))
}

/// Classifies a response by status and returns the body of a successful one.
///
/// - 204 resolves to `None`, or fails when the caller expects a payload.
/// - Other 2xx statuses resolve to the body.
/// - 3xx to [`MAX_DECODED_STATUS`] decode the error envelope into `metadata` and fail.
/// - Anything else fails without touching the body.
pub(crate) fn classify(
	metadata: &mut ResponseMetadata,
	body: Vec<u8>,
	expects_payload: bool,
) -> Result<Option<Vec<u8>>> {
	match metadata.status {
		204 if expects_payload => Err(Error::NoContentButDestinationExpected),
		204 => Ok(None),
		200..=299 => Ok(Some(body)),
		300..=MAX_DECODED_STATUS => {
			metadata.record_error_envelope(&body);

			Err(Error::UnsuccessfulRequest {
				status: metadata.status,
				message: metadata.message.clone(),
			})
		},
		status => Err(Error::UnsuccessfulRequest { status, message: None }),
	}
}

/// Decodes a JSON body, reporting the path of the first mismatch.
pub(crate) fn decode<T>(body: &[u8], status: u16) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decode { source, status: Some(status) })
}
