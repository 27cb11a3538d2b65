use std::time::Duration;

use jsonwebtoken::{
    decode, decode_header,
    errors::ErrorKind,
    jwk::{AlgorithmParameters, Jwk},
    Algorithm, DecodingKey, Validation,
};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::{
    config::{check_algorithms, AuthConfig, ConfigError},
    remote_jwk_set::RemoteJwkSet,
    Claims, Error,
};

/// Where verification keys come from: the provider's [`RemoteJwkSet`] or a fixed local key set.
#[derive(Clone)]
pub enum KeySource {
    Static(jsonwebtoken::jwk::JwkSet),
    Remote(RemoteJwkSet),
}

impl KeySource {
    pub async fn find(&self, kid: &str) -> Result<Option<Jwk>, Error> {
        match self {
            KeySource::Static(jwk_set) => Ok(jwk_set.find(kid).cloned()),
            KeySource::Remote(remote_jwk_set) => remote_jwk_set.find(kid).await,
        }
    }
}

impl From<jsonwebtoken::jwk::JwkSet> for KeySource {
    fn from(jwk_set: jsonwebtoken::jwk::JwkSet) -> Self {
        KeySource::Static(jwk_set)
    }
}

impl From<RemoteJwkSet> for KeySource {
    fn from(remote_jwk_set: RemoteJwkSet) -> Self {
        KeySource::Remote(remote_jwk_set)
    }
}

/// Checks a bearer token's signature against the provider's keys, then its issuer, audience and
/// expiry.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: KeySource,
    issuer: String,
    audience: String,
    algorithms: Vec<Algorithm>,
    leeway: Duration,
}

impl TokenVerifier {
    /// Accepts RS256 only, with no clock leeway.
    pub fn new(keys: impl Into<KeySource>, issuer: &Url, audience: impl Into<String>) -> Self {
        Self {
            keys: keys.into(),
            issuer: issuer.to_string(),
            audience: audience.into(),
            algorithms: vec![Algorithm::RS256],
            leeway: Duration::ZERO,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, Error> {
        let keys = RemoteJwkSet::from_config(config)?;
        let verifier = Self::new(keys, &config.issuer, config.audience.clone())
            .with_algorithms(config.algorithms.clone())?
            .with_leeway(config.leeway);
        Ok(verifier)
    }

    /// Replaces the accepted signature algorithms. Only RSA algorithms (RS* and PS*) are accepted.
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Result<Self, ConfigError> {
        check_algorithms(&algorithms)?;
        self.algorithms = algorithms;
        Ok(self)
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, Error> {
        // First, just decode the header part of the token, without validating it, to get the kid.
        let header = decode_header(token).map_err(Error::MalformedToken)?;
        let kid = header.kid.ok_or(Error::MissingKid)?;

        // An unknown kid is rejected here, before any signature check.
        let jwk = self.keys.find(&kid).await?.ok_or(Error::SigningKeyNotFound)?;
        let decoding_key = match &jwk.algorithm {
            AlgorithmParameters::RSA(rsa) => {
                DecodingKey::from_rsa_components(&rsa.n, &rsa.e).map_err(Error::MalformedToken)?
            }
            _ => return Err(Error::UnsupportedSigningKey),
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = self.algorithms.clone();
        validation.leeway = self.leeway.as_secs();
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let token =
            decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(classify)?;
        debug!(kid = %kid, "token signature and claims verified");
        Ok(Claims(token.claims))
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> Error {
    match err.kind() {
        ErrorKind::ExpiredSignature => Error::ExpiredToken,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => Error::ClaimInvalid(err),
        _ => Error::MalformedToken(err),
    }
}
