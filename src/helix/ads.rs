//! Ads resources.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	client::{ApiResponse, AuthRequirement, Client},
	helix::DataEnvelope,
	http::{ApiRequest, HttpTransport, ResponseMetadata},
};

/// Scope required to start a commercial.
pub const START_COMMERCIAL_SCOPE: &str = "channel:edit:commercial";

/// Body of a start-commercial call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCommercialInput {
	/// Channel to run the commercial on; its owner's token authorizes the call.
	pub broadcaster_id: UserId,
	/// Requested length in seconds.
	pub length: u32,
}

/// Outcome of a start-commercial call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCommercial {
	/// Length of the commercial actually started, in seconds.
	pub length: u32,
	/// Server message, usually empty on success.
	#[serde(default)]
	pub message: String,
	/// Seconds until the next commercial may run.
	pub retry_after: u32,
}

/// Ads resource group, see [`Client::ads`].
pub struct Ads<'a, C>
where
	C: ?Sized + HttpTransport,
{
	pub(crate) client: &'a Client<C>,
}
impl<C> Ads<'_, C>
where
	C: ?Sized + HttpTransport,
{
	/// Starts a commercial on the broadcaster's channel.
	///
	/// Requires a user token of the broadcaster granting [`START_COMMERCIAL_SCOPE`]. Resolves to
	/// `None` when the server answers with an empty `data` list.
	pub async fn start_commercial(
		&self,
		input: &StartCommercialInput,
	) -> ApiResponse<Option<StartCommercial>> {
		let auth = AuthRequirement::user(input.broadcaster_id.clone(), [START_COMMERCIAL_SCOPE]);
		let request = match self.request(input) {
			Ok(request) => request,
			Err(e) => return ApiResponse { metadata: ResponseMetadata::default(), payload: Err(e) },
		};

		self.client
			.do_request::<DataEnvelope<StartCommercial>>(&request, &auth)
			.await
			.map(DataEnvelope::into_first)
	}

	fn request(&self, input: &StartCommercialInput) -> Result<ApiRequest> {
		ApiRequest::post(self.client.endpoints().helix_url("channels/commercial")?).with_json(input)
	}
}
