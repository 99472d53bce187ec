use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    http::header,
    Error, HttpMessage, HttpRequest,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::services::jwt::{Claims, JwtService};

/// Validates the bearer token and stashes the caller's id and claims in the
/// request extensions for handlers downstream.
#[derive(Clone)]
pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            jwt_service: self.jwt_service.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    jwt_service: JwtService,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let jwt_service = self.jwt_service.clone();

        Box::pin(async move {
            let token = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| {
                    auth_header
                        .to_str()
                        .ok()
                        .and_then(|auth_str| auth_str.strip_prefix("Bearer "))
                });

            let token = match token {
                Some(token) => token,
                None => {
                    return Err(ErrorUnauthorized("Missing authorization token"));
                }
            };

            let claims = jwt_service
                .verify_access_token(token)
                .map_err(|_| ErrorUnauthorized("Invalid token"))?;
            let user_id: Uuid = claims
                .user_id()
                .map_err(|_| ErrorUnauthorized("Invalid token"))?;

            req.extensions_mut().insert(user_id);
            req.extensions_mut().insert(claims);

            let res = svc.call(req).await?;
            Ok(res)
        })
    }
}

/// Fetch the claims the middleware stored for this request.
pub fn claims_from_request(req: &HttpRequest) -> Result<Claims, Error> {
    req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| ErrorUnauthorized("Missing authentication context"))
}
