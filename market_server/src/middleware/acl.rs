//! Access control list middleware for the marketplace server.
//! This middleware can be placed on any route or service that sits behind the [`super::JwtMiddlewareFactory`].
//!
//! It checks the claims that the JWT middleware placed in the request against the roles the route requires. If the
//! user holds at least one of the required roles, the request is allowed to continue. Otherwise, a 403 Forbidden
//! response is returned.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;

use crate::{
    auth::{JwtClaims, Role},
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    required_roles: Rc<[Role]>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        Self { required_roles: required_roles.into() }
    }
}

/// Roles are alternatives: holding any one of them is enough.
pub fn check_roles(claims: &JwtClaims, required: &[Role]) -> Result<(), AuthError> {
    if required.iter().any(|role| claims.has_role(*role)) {
        return Ok(());
    }
    let needed = required.iter().map(Role::to_string).collect::<Vec<_>>().join(" or ");
    Err(AuthError::InsufficientPermissions(format!("This endpoint requires the {needed} role")))
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AclMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: Rc::clone(&self.required_roles), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Rc<[Role]>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
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
        let verdict = match req.extensions().get::<JwtClaims>() {
            Some(claims) => check_roles(claims, &self.required_roles).map_err(|e| {
                debug!("💻️ {} was denied access to {}. {e}", claims.sub, req.path());
                e
            }),
            None => {
                warn!("💻️ No JWT claims found in request extensions for {}", req.path());
                Err(AuthError::NotAuthenticated)
            },
        };
        Box::pin(async move {
            verdict.map_err(ServerError::from)?;
            service.call(req).await
        })
    }
}
