//! Request gate for the `/api/v1` scope.
//!
//! Requests to protected paths need an `Authorization` header or a session
//! cookie (401 otherwise) that resolves to a user (403 otherwise). The
//! resolved user is stored in the request extensions for [`CurrentUser`].

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::debug;

use super::auth::{require_auth, Authenticator, RequestCredentials};
use crate::db::User;
use crate::error::{AppError, AuthError};

pub struct AuthGate {
    authenticator: Option<Arc<dyn Authenticator>>,
    excluded_paths: Arc<Vec<String>>,
    cookie_name: Arc<str>,
}

impl AuthGate {
    /// A gate without an authenticator lets every request through.
    pub fn new(
        authenticator: Option<Arc<dyn Authenticator>>,
        excluded_paths: Vec<String>,
        cookie_name: &str,
    ) -> Self {
        Self {
            authenticator,
            excluded_paths: Arc::new(excluded_paths),
            cookie_name: Arc::from(cookie_name),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthGateMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGateMiddleware {
            service: Rc::new(service),
            authenticator: self.authenticator.clone(),
            excluded_paths: Arc::clone(&self.excluded_paths),
            cookie_name: Arc::clone(&self.cookie_name),
        }))
    }
}

pub struct AuthGateMiddleware<S> {
    service: Rc<S>,
    authenticator: Option<Arc<dyn Authenticator>>,
    excluded_paths: Arc<Vec<String>>,
    cookie_name: Arc<str>,
}

impl<S, B> Service<ServiceRequest> for AuthGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        let authenticator = match &self.authenticator {
            Some(authenticator) if require_auth(req.path(), &self.excluded_paths) => Arc::clone(authenticator),
            _ => {
                return Box::pin(async move {
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                })
            }
        };
        let credentials = RequestCredentials::from_request(req.request(), &self.cookie_name);

        Box::pin(async move {
            match authorize(authenticator.as_ref(), &credentials).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(err) => {
                    debug!("Rejected {} {}: {}", req.method(), req.path(), err);
                    Ok(req.error_response(err).map_into_right_body())
                }
            }
        })
    }
}

async fn authorize(authenticator: &dyn Authenticator, credentials: &RequestCredentials) -> Result<User, AppError> {
    if credentials.is_empty() {
        return Err(AuthError::Unauthorized.into());
    }
    authenticator
        .current_user(credentials)
        .await?
        .ok_or_else(|| AuthError::Forbidden.into())
}

/// The user resolved by [`AuthGate`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<User>()
                .cloned()
                .map(CurrentUser)
                .ok_or_else(|| AuthError::Forbidden.into()),
        )
    }
}
