//! Extractors for the validated assertion in handlers.

use std::future::{ready, Ready};
use std::ops::Deref;

use actix_web::dev::Payload;
use actix_web::{error, Error, FromRequest, HttpMessage, HttpRequest};

use crate::http::cas::assertion::{Assertion, AttributePrincipal};

/// Extractor for the authenticated CAS principal.
///
/// # Usage
/// ```ignore
/// use actix_cas_core::http::cas::CasPrincipal;
///
/// async fn handler(principal: CasPrincipal) -> impl Responder {
///     format!("Hello, {}!", principal.name)
/// }
/// ```
///
/// # Errors
/// Returns `401 Unauthorized` when no assertion is associated with the
/// request.
#[derive(Debug, Clone)]
pub struct CasPrincipal(AttributePrincipal);

impl CasPrincipal {
    pub fn into_inner(self) -> AttributePrincipal {
        self.0
    }
}

impl Deref for CasPrincipal {
    type Target = AttributePrincipal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for CasPrincipal {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Assertion>() {
            Some(assertion) => ready(Ok(CasPrincipal(assertion.principal().clone()))),
            None => ready(Err(error::ErrorUnauthorized("no CAS assertion"))),
        }
    }
}

/// Optional variant of [`CasPrincipal`]: yields `None` instead of failing
/// when the request is unauthenticated.
#[derive(Debug, Clone)]
pub struct OptionalCasPrincipal(Option<AttributePrincipal>);

impl OptionalCasPrincipal {
    pub fn into_inner(self) -> Option<AttributePrincipal> {
        self.0
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }
}

impl Deref for OptionalCasPrincipal {
    type Target = Option<AttributePrincipal>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for OptionalCasPrincipal {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let principal = req
            .extensions()
            .get::<Assertion>()
            .map(|assertion| assertion.principal().clone());
        ready(Ok(OptionalCasPrincipal(principal)))
    }
}

// ============================================================================
// Tests
// ============================================================================
