use std::{str::FromStr, time::Duration};

use jsonwebtoken::Algorithm;
use url::Url;

pub const DEFAULT_DOMAIN: &str = "dev-example.auth0.com";
pub const DEFAULT_AUDIENCE: &str = "coffee";

/// Path below the provider domain where most OpenID Connect providers publish their signing keys.
pub const JWKS_ENDPOINT: &str = ".well-known/jwks.json";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid identity provider domain `{domain}`")]
    InvalidDomain {
        domain: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported signature algorithm `{0}`")]
    InvalidAlgorithm(String),
    #[error("no signature algorithms configured")]
    NoAlgorithms,
    #[error("{var} must be a number of seconds, got `{value}`")]
    InvalidSeconds { var: &'static str, value: String },
}

/// Identity provider settings, resolved once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub domain: String,
    pub audience: String,
    pub algorithms: Vec<Algorithm>,
    pub issuer: Url,
    pub jwks_url: Url,
    /// `None` fetches the key set on every verification.
    pub jwks_cache_ttl: Option<Duration>,
    pub jwks_min_refresh_interval: Duration,
    pub fetch_timeout: Duration,
    pub leeway: Duration,
}

impl AuthConfig {
    /// Derives issuer `https://<domain>/` and key set URL
    /// `https://<domain>/.well-known/jwks.json`.
    pub fn new(
        domain: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let domain = domain.into();
        let issuer = Url::parse(&format!("https://{domain}/")).map_err(|source| {
            ConfigError::InvalidDomain {
                domain: domain.clone(),
                source,
            }
        })?;
        let jwks_url = issuer.join(JWKS_ENDPOINT).map_err(|source| ConfigError::InvalidDomain {
            domain: domain.clone(),
            source,
        })?;

        Ok(Self {
            domain,
            audience: audience.into(),
            algorithms: vec![Algorithm::RS256],
            issuer,
            jwks_url,
            jwks_cache_ttl: Some(Duration::from_secs(600)),
            jwks_min_refresh_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(5),
            leeway: Duration::ZERO,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`AuthConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let domain = lookup("AUTH0_DOMAIN").unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
        let audience = lookup("API_AUDIENCE").unwrap_or_else(|| DEFAULT_AUDIENCE.to_string());
        let mut config = Self::new(domain, audience)?;

        if let Some(algorithms) = lookup("AUTH_ALGORITHMS") {
            config.algorithms = parse_algorithms(&algorithms)?;
        }
        if let Some(ttl) = seconds(&lookup, "AUTH_JWKS_CACHE_TTL_SECS")? {
            config.jwks_cache_ttl = (!ttl.is_zero()).then_some(ttl);
        }
        if let Some(interval) = seconds(&lookup, "AUTH_JWKS_MIN_REFRESH_SECS")? {
            config.jwks_min_refresh_interval = interval;
        }
        if let Some(timeout) = seconds(&lookup, "AUTH_JWKS_TIMEOUT_SECS")? {
            config.fetch_timeout = timeout;
        }
        if let Some(leeway) = seconds(&lookup, "AUTH_LEEWAY_SECS")? {
            config.leeway = leeway;
        }
        Ok(config)
    }

    pub fn with_issuer(mut self, issuer: Url) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn with_jwks_url(mut self, jwks_url: Url) -> Self {
        self.jwks_url = jwks_url;
        self
    }

    pub fn with_jwks_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Verification keys are built from RSA components only, so any other family can never match.
pub(crate) fn check_algorithms(algorithms: &[Algorithm]) -> Result<(), ConfigError> {
    if algorithms.is_empty() {
        return Err(ConfigError::NoAlgorithms);
    }
    match algorithms.iter().find(|algorithm| !is_rsa(**algorithm)) {
        Some(algorithm) => Err(ConfigError::InvalidAlgorithm(format!("{algorithm:?}"))),
        None => Ok(()),
    }
}

fn is_rsa(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

fn parse_algorithms(value: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let algorithms = value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            Algorithm::from_str(name).map_err(|_| ConfigError::InvalidAlgorithm(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    check_algorithms(&algorithms)?;
    Ok(algorithms)
}

fn seconds<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidSeconds { var, value })
        })
        .transpose()
}
