use std::{
    sync::Arc,
    task::{Context, Poll},
};

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use http::HeaderMap;
use tower::Layer;
use tower_service::Service;
use tracing::{debug, warn};

use crate::{
    bearer::bearer_token, config::AuthConfig, permissions::check_permissions,
    verifier::TokenVerifier, Claims, Error,
};

/// Runs the full check for a protected request: bearer token extraction, token verification and
/// the permission check, stopping at the first failure.
#[derive(Clone)]
pub struct Authorizer {
    verifier: Arc<TokenVerifier>,
}

impl Authorizer {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self {
            verifier: Arc::new(verifier),
        }
    }

    /// Verifies tokens against the key set published by the configured provider.
    pub fn from_config(config: &AuthConfig) -> Result<Self, Error> {
        TokenVerifier::from_config(config).map(Self::new)
    }

    pub async fn authorize(&self, headers: &HeaderMap, permission: &str) -> Result<Claims, Error> {
        let token = bearer_token(headers)?;
        debug!("bearer token extracted");

        let claims = self.verifier.verify(token).await?;
        check_permissions(permission, &claims)?;
        debug!(permission, subject = claims.subject(), "permission granted");
        Ok(claims)
    }

    /// Returns a layer that only lets requests through whose token grants `permission`.
    pub fn require(&self, permission: impl Into<Arc<str>>) -> RequirePermissionLayer {
        RequirePermissionLayer {
            authorizer: self.clone(),
            permission: permission.into(),
        }
    }
}

/// Guards a route with a single required permission.
///
/// Authorized requests reach the inner service with their [`Claims`] in the request extensions.
/// Rejected requests never reach it and are answered with the rendered [`Error`].
#[derive(Clone)]
pub struct RequirePermissionLayer {
    authorizer: Authorizer,
    permission: Arc<str>,
}

impl<S> Layer<S> for RequirePermissionLayer {
    type Service = RequirePermissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionService {
            inner,
            authorizer: self.authorizer.clone(),
            permission: self.permission.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequirePermissionService<S> {
    inner: S,
    authorizer: Authorizer,
    permission: Arc<str>,
}

impl<S> Service<Request> for RequirePermissionService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // Move the original service into the closure instead of its clone. This makes sure that the
        // original service is `call`ed instead of the cloned one, which might not be ready yet
        // (`poll_ready` hasn't been called on the clone yet).
        // See "Be careful when cloning inner services" in the `tower::Service` docs.
        let inner_clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner_clone);

        let authorizer = self.authorizer.clone();
        let permission = self.permission.clone();
        Box::pin(async move {
            match authorizer.authorize(req.headers(), &permission).await {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Err(err) => {
                    if err.is_dependency_fault() {
                        warn!(error = %err, "identity provider unavailable, rejecting request");
                    } else {
                        warn!(
                            code = err.code(),
                            status = err.status_code().as_u16(),
                            %permission,
                            "request rejected"
                        );
                    }
                    Ok(err.into_response())
                }
            }
        })
    }
}
