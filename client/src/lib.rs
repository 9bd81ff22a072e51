//! Typed HTTP client for the GymFlow API.
//!
//! Every call decodes the `ApiResponse` envelope. An expired access token
//! is refreshed once through the `refresh_token` cookie and the call is
//! retried.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;

pub use client::ApiClient;
pub use error::ClientError;
