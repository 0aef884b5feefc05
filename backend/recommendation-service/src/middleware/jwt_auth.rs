//! JWT authentication middleware
//!
//! Validates a Bearer token when one is present and stores the caller's
//! [`UserId`] in the request extensions. Requests without an Authorization
//! header pass through anonymously; a present-but-invalid token is rejected.
//! Handlers pick the strictness they need through the [`UserId`] (required)
//! or [`MaybeUserId`] (optional) extractors.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// User ID extracted from a validated JWT
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

/// Optional caller identity for endpoints that serve anonymous traffic too
#[derive(Debug, Clone, Copy)]
pub struct MaybeUserId(pub Option<Uuid>);

pub(crate) fn decode_user_id(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        AppError::Authentication(format!("Invalid token: {}", e))
    })?;

    Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| AppError::Authentication("Invalid token: malformed user_id".to_string()))
}

/// JWT Authentication Middleware
pub struct JwtAuth {
    secret: Rc<String>,
}

impl JwtAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Rc::new(secret.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service: Rc::new(service),
            secret: Rc::clone(&self.secret),
        }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
    secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = Rc::clone(&self.secret);

        Box::pin(async move {
            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(|h| h.to_string());

            if let Some(auth_header) = auth_header {
                let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
                    Error::from(AppError::Authentication(
                        "Invalid Authorization header format".to_string(),
                    ))
                })?;

                let user_id = decode_user_id(token, &secret)?;
                req.extensions_mut().insert(UserId(user_id));
            }

            service.call(req).await
        })
    }
}

impl actix_web::FromRequest for UserId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<UserId>() {
            Some(user_id) => ready(Ok(*user_id)),
            None => ready(Err(
                AppError::Authentication("Authentication required".to_string()).into(),
            )),
        }
    }
}

impl actix_web::FromRequest for MaybeUserId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let user_id = req.extensions().get::<UserId>().map(|u| u.0);
        ready(Ok(MaybeUserId(user_id)))
    }
}
