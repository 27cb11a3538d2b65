use http::{header::AUTHORIZATION, HeaderMap};

use crate::Error;

const BEARER_SCHEME: &str = "bearer";

/// Pulls the bearer token out of the `Authorization` header.
///
/// The header value must split on whitespace into exactly two parts, the first of which is
/// `Bearer` in any casing. The second part is returned as is.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, Error> {
    let header = headers.get(AUTHORIZATION).ok_or(Error::HeaderMissing)?;
    let header = header.to_str().map_err(|_| Error::InvalidTokenFormat)?;

    let mut parts = header.split_whitespace();
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::InvalidTokenFormat);
    };

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(Error::InvalidHeader);
    }
    Ok(token)
}
