use std::sync::Arc;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;

use crate::config::ConfigError;

/// Every way a protected request can be turned away.
///
/// Each variant carries a stable machine-readable [`code`](Error::code), a human-readable
/// description (its `Display` text) and the HTTP [`status_code`](Error::status_code) the boundary
/// layer responds with.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Authorization header absent")]
    HeaderMissing,
    #[error("Invalid authorization token format, expected `Bearer <token>`")]
    InvalidTokenFormat,
    #[error("Authorization header does not begin with Bearer")]
    InvalidHeader,
    #[error("Token header is missing a key id")]
    MissingKid,
    #[error("Signing key not found")]
    SigningKeyNotFound,
    #[error("Signing key is not an RSA key")]
    UnsupportedSigningKey,
    #[error("Token is malformed or its signature is invalid")]
    MalformedToken(#[source] jsonwebtoken::errors::Error),
    #[error("Token claims are invalid")]
    ClaimInvalid(#[source] jsonwebtoken::errors::Error),
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Token does not carry a permissions claim")]
    PermissionsClaimMissing,
    #[error("No permission to access")]
    Unauthorized,
    #[error("failed to fetch JWK set")]
    KeyFetchFailed(#[from] reqwest::Error),
    #[error("received error response when fetching JWK set: {status}")]
    KeySetResponse { status: StatusCode },
    /// A key set fetch that failed while other lookups were waiting on it.
    #[error("failed to fetch JWK set")]
    SharedKeyFetch(#[source] Arc<Error>),
    #[error("invalid authorization configuration")]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::HeaderMissing => "header_missing",
            Error::InvalidTokenFormat => "invalid_token",
            Error::InvalidHeader => "invalid_header",
            Error::MissingKid
            | Error::SigningKeyNotFound
            | Error::UnsupportedSigningKey
            | Error::MalformedToken(_) => "header_invalid",
            Error::ClaimInvalid(_) => "claim_invalid",
            Error::ExpiredToken => "expired_token",
            Error::PermissionsClaimMissing => "permissions_missing",
            Error::Unauthorized => "unauthorized_access",
            Error::KeyFetchFailed(_)
            | Error::KeySetResponse { .. }
            | Error::SharedKeyFetch(_) => "key_fetch_failed",
            Error::Config(_) => "invalid_configuration",
        }
    }

    pub fn description(&self) -> String {
        self.to_string()
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::SigningKeyNotFound
            | Error::UnsupportedSigningKey
            | Error::MalformedToken(_)
            | Error::PermissionsClaimMissing => StatusCode::BAD_REQUEST,
            Error::KeyFetchFailed(_) | Error::KeySetResponse { .. } | Error::SharedKeyFetch(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether the failure came from the identity provider rather than from the presented token.
    pub fn is_dependency_fault(&self) -> bool {
        matches!(
            self,
            Error::KeyFetchFailed(_) | Error::KeySetResponse { .. } | Error::SharedKeyFetch(_)
        )
    }
}

/// Takes back the error of a coalesced cache load, keeping it shared while other waiters hold it.
impl From<Arc<Error>> for Error {
    fn from(err: Arc<Error>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(Error::SharedKeyFetch)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "success": false,
            "message": self.description(),
            "error": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
