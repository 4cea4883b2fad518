//! Client for the Galley account backend.
//!
//! This module provides the `AuthClient` for exchanging a provider OAuth
//! token for an application session and for Bearer-authenticated profile
//! updates. Persistence is deliberately elsewhere (`crate::auth`).

pub mod client;
pub mod error;

pub use client::AuthClient;
pub use error::AuthError;
