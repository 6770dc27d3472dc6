//! Credential lifecycle and retry-aware request engine for the Twitch Helix API.
//!
//! The crate is split in two cooperating halves:
//!
//! - [`provider`] owns every token the application holds (one app token plus any number of user
//!   tokens), decides when a token is stale, and refreshes it against the OAuth token API with
//!   single-flight guards and fire-and-forget refresh notifications.
//! - [`client`] executes one logical Helix call at a time: it resolves the right token from the
//!   provider, dispatches through an injectable [`http::HttpTransport`], and applies the retry
//!   policy matching the response (401 refresh-and-retry-once, 429 wait-for-reset, 503 bounded
//!   fixed-interval retries).
//!
//! Resource builders in [`helix`] are thin wrappers over [`client::Client::do_request`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod helix;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use time;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
