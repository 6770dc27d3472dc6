//! Resource API builders layered over [`Client::do_request`].
//!
//! Each resource group borrows the client it was created from, so retry, user-context, and
//! cancellation settings of that client value apply to every call it builds.

pub mod ads;
pub mod chat;

pub use ads::*;
pub use chat::*;

// self
use crate::{_prelude::*, client::Client, http::HttpTransport};

/// `data` envelope wrapping resource API payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
	/// Returned items.
	pub data: Vec<T>,
}
impl<T> DataEnvelope<T> {
	/// Returns the first item, if any.
	pub fn into_first(self) -> Option<T> {
		self.data.into_iter().next()
	}
}

impl<C> Client<C>
where
	C: ?Sized + HttpTransport,
{
	/// Ads resource group.
	pub fn ads(&self) -> Ads<'_, C> {
		Ads { client: self }
	}

	/// Chat resource group.
	pub fn chat(&self) -> Chat<'_, C> {
		Chat { client: self }
	}
}
