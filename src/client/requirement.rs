//! Authorization requirements attached to each call.

// self
use crate::{_prelude::*, auth::UserId};

/// Token a call must be authorized with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthRequirement {
	/// No token; the call carries neither `Authorization` nor `Client-Id`.
	#[default]
	Anonymous,
	/// The token of the client's user context, else of `user_id`, when that user is known to
	/// the provider; the app token otherwise.
	AppOrUser {
		/// User to prefer when the client carries no user context.
		user_id: Option<UserId>,
	},
	/// The token of `user_id`, which must grant every scope in `scopes`.
	///
	/// With an empty scope list this behaves like [`AuthRequirement::AppOrUser`].
	User {
		/// User whose token authorizes the call.
		user_id: Option<UserId>,
		/// Scopes the token must grant.
		scopes: Vec<String>,
	},
}
impl AuthRequirement {
	/// App token, or the contextual user's token.
	pub fn app_or_user() -> Self {
		Self::AppOrUser { user_id: None }
	}

	/// Token of `user_id` granting `scopes`.
	pub fn user<I, S>(user_id: UserId, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::User { user_id: Some(user_id), scopes: scopes.into_iter().map(Into::into).collect() }
	}
}
