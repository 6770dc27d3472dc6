//! Chat resources.

// self
use crate::{
	_prelude::*,
	client::{ApiResponse, AuthRequirement, Client},
	helix::DataEnvelope,
	http::{ApiRequest, HttpTransport, ResponseMetadata},
};

/// Badge set usable in any channel's chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBadge {
	/// Badge set identifier, such as `subscriber`.
	pub set_id: String,
	/// Versions of the badge.
	pub versions: Vec<BadgeVersion>,
}

/// One version of a badge set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeVersion {
	/// Version identifier.
	pub id: String,
	/// 18px image.
	pub image_url_1x: String,
	/// 36px image.
	pub image_url_2x: String,
	/// 72px image.
	pub image_url_4x: String,
	/// Badge title.
	pub title: String,
	/// Badge description.
	pub description: String,
	/// Action taken when the badge is clicked.
	#[serde(default)]
	pub click_action: Option<String>,
	/// URL opened by the click action.
	#[serde(default)]
	pub click_url: Option<String>,
}

/// Chat resource group, see [`Client::chat`].
pub struct Chat<'a, C>
where
	C: ?Sized + HttpTransport,
{
	pub(crate) client: &'a Client<C>,
}
impl<C> Chat<'_, C>
where
	C: ?Sized + HttpTransport,
{
	/// Lists the global chat badges.
	///
	/// Authorized with the app token, or with the user token of the client's user context.
	pub async fn global_badges(&self) -> ApiResponse<Vec<ChatBadge>> {
		let url = match self.client.endpoints().helix_url("chat/badges/global") {
			Ok(url) => url,
			Err(e) => return ApiResponse { metadata: ResponseMetadata::default(), payload: Err(e) },
		};

		self.client
			.do_request::<DataEnvelope<ChatBadge>>(
				&ApiRequest::get(url),
				&AuthRequirement::app_or_user(),
			)
			.await
			.map(|envelope| envelope.data)
	}
}
