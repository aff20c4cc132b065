//! Service-principal authentication for the Luna AML adapter.
//!
//! Acquires Azure AD access tokens with the OAuth 2.0 client credentials
//! grant and caches them until shortly before they expire.
//!
//! # Modules
//!
//! - `credential`: service principal config and the token request
//! - `token_provider`: [`TokenProvider`] trait with caching and static implementations
//! - `error`: Error types

pub mod credential;
pub mod error;
pub mod token_provider;

pub use credential::{AccessToken, ServicePrincipalConfig, request_token};
pub use error::{AuthError, Result};
pub use token_provider::{
    ServicePrincipalTokenProvider, SharedTokenProvider, StaticTokenProvider, TokenProvider,
};
