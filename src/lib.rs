//! Bearer token authorization
//! [middleware for `axum`](https://docs.rs/axum/latest/axum/middleware/index.html) for the drinks
//! API, backed by an OAuth2 / OpenID Connect identity provider such as Auth0.
//!
//! ## Overview
//!
//! Every protected route names one permission string, e.g. `post:drinks`. A request is let through
//! only if:
//!
//! 1. it carries an `Authorization: Bearer <token>` header,
//! 2. the token is an RSA-signed [JWT](https://datatracker.ietf.org/doc/html/rfc7519) (RS256 unless
//!    configured otherwise) whose key id (`kid`) is published in the provider's
//!    [JWK set](https://datatracker.ietf.org/doc/html/rfc7517) at
//!    `https://<domain>/.well-known/jwks.json`,
//! 3. its issuer, audience and expiry check out, and
//! 4. its `permissions` claim lists the route's permission.
//!
//! Authorized requests reach the handler with the decoded [`Claims`] in the request extensions.
//! Everything else is answered with an [`Error`] rendered as
//! `{"success": false, "message": ..., "error": <status>}`.
//!
//! Fetching the JWK set is the only network round-trip. It is bounded by a timeout, optionally
//! cached with a time-to-live, and re-fetched early when a token names a key id the cached set does
//! not know about. Concurrent lookups on an empty cache share a single fetch. Failures to reach the
//! provider are reported as `503 Service Unavailable`, never as an authentication failure.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use axum::{routing::{get, post}, Extension, Router};
//! use drinks_auth::{AuthConfig, Authorizer, Claims};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads AUTH0_DOMAIN, API_AUDIENCE and friends.
//!     let config = AuthConfig::from_env()?;
//!     let authorizer = Authorizer::from_config(&config)?;
//!
//!     let router = Router::new()
//!         .route("/drinks", get(|| async { "public" }))
//!         .route(
//!             "/drinks",
//!             post(|Extension(claims): Extension<Claims>| async move {
//!                 format!("hello {:?}", claims.subject())
//!             })
//!             .route_layer(authorizer.require("post:drinks")),
//!         );
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod authorization;
pub mod bearer;
pub mod config;
pub mod permissions;
pub mod remote_jwk_set;
pub mod verifier;

pub use authorization::{Authorizer, RequirePermissionLayer};
pub use bearer::bearer_token;
pub use claims::Claims;
pub use config::{AuthConfig, ConfigError};
pub use error::Error;
pub use permissions::check_permissions;
pub use remote_jwk_set::RemoteJwkSet;
pub use verifier::{KeySource, TokenVerifier};

mod claims;
mod error;

#[cfg(test)]
mod test_support;
