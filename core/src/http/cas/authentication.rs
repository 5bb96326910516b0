//! Authentication redirect filter.
//!
//! First CAS filter in the chain. It decides, per request, between pass
//! through (excluded URL, existing session assertion, incoming ticket, or
//! an already-attempted gateway round-trip) and a redirect to the CAS
//! login page.
//!
//! # Example
//! ```ignore
//! use actix_cas_core::http::cas::{CasAuthenticationFilter, CasConfig};
//!
//! let cas = CasAuthenticationFilter::new(
//!     CasConfig::new()
//!         .cas_server_url_prefix("https://cas.example.org/cas")
//!         .server_name("http://app.example.org:8080"),
//! )?;
//!
//! App::new()
//!     .wrap(cas.clone())
//!     .wrap(session_middleware)
//! ```

use std::rc::Rc;
use std::sync::Arc;

use actix_service::{Service, Transform};
use actix_session::SessionExt;
use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::{Error, HttpMessage, HttpResponse};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use tracing::debug;

use crate::http::cas::assertion::{
    Assertion, CAS_ASSERTION_SESSION_KEY, CAS_SESSION_INDEX_KEY,
};
use crate::http::cas::config::CasConfig;
use crate::http::cas::gateway::{DefaultGatewayStorage, GatewayResolver};
use crate::http::cas::single_sign_out::SingleSignOutHandler;
use crate::http::cas::url_matcher::UrlPatternMatcher;
use crate::http::cas::urls;
use crate::http::error::CasError;

/// Middleware factory for the authentication redirect filter.
#[derive(Clone)]
pub struct CasAuthenticationFilter {
    config: Arc<CasConfig>,
    login_url: Arc<str>,
    ignore_matcher: Option<Arc<UrlPatternMatcher>>,
    gateway_storage: Arc<dyn GatewayResolver>,
    sign_out: Option<Arc<SingleSignOutHandler>>,
}

impl CasAuthenticationFilter {
    /// Validates the configuration and resolves the login URL and
    /// exclusion matcher. Misconfiguration fails here, at startup.
    pub fn new(config: CasConfig) -> Result<Self, CasError> {
        config.validate()?;
        let login_url = config.login_url()?;
        let ignore_matcher = config.ignore_matcher()?.map(Arc::new);
        let gateway_storage =
            Arc::new(DefaultGatewayStorage::new(config.gateway_storage_salt.clone()));
        Ok(CasAuthenticationFilter {
            config: Arc::new(config),
            login_url: login_url.into(),
            ignore_matcher,
            gateway_storage,
            sign_out: None,
        })
    }

    /// Replaces the session-backed gateway storage.
    pub fn gateway_storage(mut self, storage: Arc<dyn GatewayResolver>) -> Self {
        self.gateway_storage = storage;
        self
    }

    /// Attaches the single sign-out handler so that sessions terminated by
    /// a logout notification are purged on their next request.
    pub fn single_sign_out(mut self, handler: Arc<SingleSignOutHandler>) -> Self {
        self.sign_out = Some(handler);
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for CasAuthenticationFilter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = CasAuthenticationService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CasAuthenticationService {
            service: Rc::new(service),
            filter: self.clone(),
        })
    }
}

pub struct CasAuthenticationService<S> {
    service: Rc<S>,
    filter: CasAuthenticationFilter,
}

impl<S, B> Service<ServiceRequest> for CasAuthenticationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let filter = self.filter.clone();

        Box::pin(async move {
            if let Some(matcher) = &filter.ignore_matcher {
                if matcher.matches(&urls::full_request_url(&req)) {
                    debug!("request is ignored");
                    let res = service.call(req).await?;
                    return Ok(res.map_into_left_body());
                }
            }

            // Proxy-granting ticket callbacks are server-to-server and
            // carry no session; the validation filter answers them.
            if let Some(receptor) = filter.config.proxy_receptor_url.as_deref() {
                if !receptor.is_empty() && req.path().ends_with(receptor) {
                    let res = service.call(req).await?;
                    return Ok(res.map_into_left_body());
                }
            }

            let session = req.get_session();

            if let Some(handler) = &filter.sign_out {
                let index = session
                    .get::<String>(CAS_SESSION_INDEX_KEY)
                    .unwrap_or_default();
                if let Some(index) = index {
                    if handler.take_invalidated(&index) {
                        debug!("session was terminated by single sign-out; purging");
                        session.purge();
                    }
                }
            }

            let assertion = session
                .get::<Assertion>(CAS_ASSERTION_SESSION_KEY)
                .unwrap_or_default();
            if let Some(assertion) = assertion {
                if assertion.is_valid() {
                    req.extensions_mut().insert(assertion);
                    let res = service.call(req).await?;
                    return Ok(res.map_into_left_body());
                }
                debug!("session assertion is outside its validity window; dropping it");
                session.remove(CAS_ASSERTION_SESSION_KEY);
            }

            let service_url = urls::construct_service_url(&req, &filter.config);
            let ticket =
                urls::query_param(req.query_string(), filter.config.protocol.artifact_parameter());
            let has_ticket = ticket.map_or(false, |t| !t.is_empty());
            let was_gatewayed = filter.config.gateway
                && filter
                    .gateway_storage
                    .has_gatewayed_already(&req, &service_url);

            if has_ticket || was_gatewayed {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            debug!("no ticket and no assertion found");
            let modified_service_url = if filter.config.gateway {
                debug!("setting gateway attribute in session");
                filter
                    .gateway_storage
                    .store_gateway_information(&req, &service_url)
            } else {
                service_url
            };

            let redirect_url = urls::construct_redirect_url(
                &filter.login_url,
                filter.config.protocol.service_parameter(),
                &modified_service_url,
                filter.config.renew,
                filter.config.gateway,
                filter.config.encode_service_url,
            );
            debug!("redirecting to \"{}\"", redirect_url);

            let response = HttpResponse::Found()
                .insert_header((header::LOCATION, redirect_url))
                .finish()
                .map_into_right_body();
            let (http_req, _) = req.into_parts();
            Ok(ServiceResponse::new(http_req, response))
        })
    }
}
