//! Token value model: redacted secrets, lifetimes with a safety margin, and the app/user token
//! kinds cached by the providers.

pub mod access;
pub mod info;
pub mod lifetime;
pub mod secret;
