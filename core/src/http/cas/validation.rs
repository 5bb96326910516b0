//! Ticket validation filter.
//!
//! Second CAS filter in the chain. It consumes the ticket parameter the
//! browser carries back from the login page, validates it against the
//! server and binds the resulting assertion to the request and, when
//! enabled, the session. Proxy-granting ticket callbacks from the server
//! are answered here as well, before the normal chain runs.
//!
//! # Example
//! ```ignore
//! use actix_cas_core::http::cas::{CasConfig, CasValidationFilter};
//!
//! let validation = CasValidationFilter::new(
//!     CasConfig::new()
//!         .cas_server_url_prefix("https://cas.example.org/cas")
//!         .server_name("http://app.example.org:8080"),
//! )?;
//!
//! // Evict expired proxy-granting tickets for the process lifetime.
//! let _cleanup = validation.start_cleanup();
//!
//! App::new()
//!     .wrap(validation.clone())
//!     .wrap(cas_authentication_filter)
//!     .wrap(session_middleware)
//! ```

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use actix_service::{Service, Transform};
use actix_session::SessionExt;
use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::{Error, HttpMessage, HttpResponse};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use tracing::{debug, error, warn};

use crate::http::cas::assertion::{
    Assertion, CAS_ASSERTION_SESSION_KEY, CAS_SESSION_INDEX_KEY,
};
use crate::http::cas::cipher::{CasCipher, CipherAlgorithm};
use crate::http::cas::config::CasConfig;
use crate::http::cas::pgt::{
    CleanupScheduler, EncryptedProxyGrantingTicketStorage, InMemoryProxyGrantingTicketStorage,
    ProxyGrantingTicketStorage,
};
use crate::http::cas::single_sign_out::{generate_session_index, SingleSignOutHandler};
use crate::http::cas::url_matcher::UrlPatternMatcher;
use crate::http::cas::urls;
use crate::http::cas::validator::{
    Cas20ProxyTicketValidator, Cas20ServiceTicketValidator, TicketValidator,
};
use crate::http::error::CasError;

/// Hook invoked after a successful validation, before any redirect. The
/// default is a no-op; applications correlate the principal to their own
/// identity or token here.
pub type ValidationSuccessHook = dyn Fn(&ServiceRequest, &Assertion) + Send + Sync;

/// Hook invoked after a failed validation, before the failure response.
pub type ValidationFailureHook = dyn Fn(&ServiceRequest, &CasError) + Send + Sync;

/// Middleware factory for the ticket validation filter.
#[derive(Clone)]
pub struct CasValidationFilter {
    config: Arc<CasConfig>,
    ignore_matcher: Option<Arc<UrlPatternMatcher>>,
    validator: Arc<dyn TicketValidator>,
    pgt_storage: Arc<dyn ProxyGrantingTicketStorage>,
    sign_out: Option<Arc<SingleSignOutHandler>>,
    on_success: Option<Arc<ValidationSuccessHook>>,
    on_failure: Option<Arc<ValidationFailureHook>>,
}

impl CasValidationFilter {
    /// Builds the filter with a validator chosen from the configuration: a
    /// plain service-ticket validator unless proxy support is enabled
    /// (`accept_any_proxy` or a non-empty allowed-chain list), in which
    /// case a proxy-capable one.
    pub fn new(config: CasConfig) -> Result<Self, CasError> {
        config.validate()?;
        let config = normalize(config);
        let ignore_matcher = config.ignore_matcher()?.map(Arc::new);
        let pgt_storage = build_pgt_storage(&config)?;

        let validator: Arc<dyn TicketValidator> =
            if config.accept_any_proxy || !config.allowed_proxy_chains.is_empty() {
                Arc::new(Cas20ProxyTicketValidator::new(
                    &config,
                    Some(Arc::clone(&pgt_storage)),
                )?)
            } else {
                Arc::new(Cas20ServiceTicketValidator::new(
                    &config,
                    Some(Arc::clone(&pgt_storage)),
                )?)
            };

        Ok(CasValidationFilter {
            config: Arc::new(config),
            ignore_matcher,
            validator,
            pgt_storage,
            sign_out: None,
            on_success: None,
            on_failure: None,
        })
    }

    /// Builds the filter around an externally supplied validator. The
    /// proxy-granting ticket store is still owned by the filter so the
    /// proxy receptor keeps working.
    pub fn with_validator(
        config: CasConfig,
        validator: Arc<dyn TicketValidator>,
    ) -> Result<Self, CasError> {
        config.validate()?;
        let config = normalize(config);
        let ignore_matcher = config.ignore_matcher()?.map(Arc::new);
        let pgt_storage = build_pgt_storage(&config)?;
        Ok(CasValidationFilter {
            config: Arc::new(config),
            ignore_matcher,
            validator,
            pgt_storage,
            sign_out: None,
            on_success: None,
            on_failure: None,
        })
    }

    /// Attaches the single sign-out handler; validated tickets are then
    /// recorded in its registry.
    pub fn single_sign_out(mut self, handler: Arc<SingleSignOutHandler>) -> Self {
        self.sign_out = Some(handler);
        self
    }

    pub fn on_successful_validation(
        mut self,
        hook: impl Fn(&ServiceRequest, &Assertion) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_failed_validation(
        mut self,
        hook: impl Fn(&ServiceRequest, &CasError) + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    /// The proxy-granting ticket store backing this filter.
    pub fn pgt_storage(&self) -> Arc<dyn ProxyGrantingTicketStorage> {
        Arc::clone(&self.pgt_storage)
    }

    /// Starts the periodic eviction task with the configured period. Call
    /// once from within the runtime; keep the scheduler until shutdown.
    pub fn start_cleanup(&self) -> CleanupScheduler {
        CleanupScheduler::start(
            Arc::clone(&self.pgt_storage),
            Duration::from_millis(self.config.millis_between_clean_ups),
        )
    }
}

/// `redirect_after_validation` without a session would redirect forever:
/// the next request has no cached assertion and carries no ticket.
fn normalize(mut config: CasConfig) -> CasConfig {
    if !config.use_session && config.redirect_after_validation {
        warn!(
            "redirectAfterValidation may not be true when useSession is false; \
             resetting it to false to prevent infinite redirects"
        );
        config.redirect_after_validation = false;
    }
    config
}

fn build_pgt_storage(config: &CasConfig) -> Result<Arc<dyn ProxyGrantingTicketStorage>, CasError> {
    let retention = Duration::from_millis(config.pgt_retention_millis);
    match &config.secret_key {
        Some(key) => {
            let algorithm = CipherAlgorithm::from_name(&config.cipher_algorithm)?;
            let cipher = CasCipher::new(algorithm, key)?;
            Ok(Arc::new(EncryptedProxyGrantingTicketStorage::new(
                cipher, retention,
            )))
        }
        None => Ok(Arc::new(InMemoryProxyGrantingTicketStorage::with_retention(
            retention,
        ))),
    }
}

impl<S, B> Transform<S, ServiceRequest> for CasValidationFilter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = CasValidationService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CasValidationService {
            service: Rc::new(service),
            filter: self.clone(),
        })
    }
}

pub struct CasValidationService<S> {
    service: Rc<S>,
    filter: CasValidationFilter,
}

impl<S, B> Service<ServiceRequest> for CasValidationService<S>
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
                    let res = service.call(req).await?;
                    return Ok(res.map_into_left_body());
                }
            }

            if let Some(receptor) = filter.config.proxy_receptor_url.as_deref() {
                if !receptor.is_empty() && req.path().ends_with(receptor) {
                    return Ok(handle_proxy_receptor(req, &filter.pgt_storage));
                }
            }

            let ticket =
                urls::query_param(req.query_string(), filter.config.protocol.artifact_parameter());
            let Some(ticket) = ticket.filter(|t| !t.is_empty()) else {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            };

            debug!("attempting to validate ticket: {}", ticket);
            let service_url = urls::construct_service_url(&req, &filter.config);

            match filter.validator.validate(&ticket, &service_url).await {
                Ok(assertion) => {
                    debug!(
                        "successfully authenticated user: {}",
                        assertion.principal().name
                    );
                    req.extensions_mut().insert(assertion.clone());

                    if filter.config.use_session {
                        let session = req.get_session();
                        if let Err(err) =
                            session.insert(CAS_ASSERTION_SESSION_KEY, &assertion)
                        {
                            warn!("failed to store assertion in session: {}", err);
                        }
                        if let Some(handler) = &filter.sign_out {
                            let index = generate_session_index();
                            if let Err(err) = session.insert(CAS_SESSION_INDEX_KEY, &index) {
                                warn!("failed to store session index: {}", err);
                            }
                            handler.record_session(&ticket, &index);
                        }
                    }

                    if let Some(hook) = &filter.on_success {
                        hook(&req, &assertion);
                    }

                    if filter.config.redirect_after_validation {
                        debug!("redirecting after successful ticket validation");
                        let response = HttpResponse::Found()
                            .insert_header((header::LOCATION, service_url))
                            .finish()
                            .map_into_right_body();
                        let (http_req, _) = req.into_parts();
                        return Ok(ServiceResponse::new(http_req, response));
                    }

                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(err) => {
                    debug!("ticket validation failed: {}", err);
                    if let Some(hook) = &filter.on_failure {
                        hook(&req, &err);
                    }
                    if filter.config.exception_on_validation_failure {
                        return Err(err.into());
                    }
                    let response = HttpResponse::Forbidden()
                        .body(err.to_string())
                        .map_into_right_body();
                    let (http_req, _) = req.into_parts();
                    Ok(ServiceResponse::new(http_req, response))
                }
            }
        })
    }
}

/// Answers an out-of-band proxy-granting ticket delivery from the CAS
/// server. The server only needs an HTTP success; the body is empty.
fn handle_proxy_receptor<B>(
    req: ServiceRequest,
    storage: &Arc<dyn ProxyGrantingTicketStorage>,
) -> ServiceResponse<EitherBody<B>> {
    let iou = urls::query_param(req.query_string(), "pgtIou");
    let id = urls::query_param(req.query_string(), "pgtId");

    let response = match (iou, id) {
        (Some(iou), Some(id)) if !iou.is_empty() && !id.is_empty() => {
            debug!("received proxy-granting ticket callback for IOU {}", iou);
            match storage.save(&iou, &id) {
                Ok(()) => HttpResponse::Ok().finish(),
                Err(err) => {
                    error!("failed to store proxy-granting ticket: {}", err);
                    HttpResponse::InternalServerError().finish()
                }
            }
        }
        _ => {
            // The server probes the callback URL without parameters first;
            // it expects a success either way.
            debug!("proxy receptor request without pgtIou/pgtId");
            HttpResponse::Ok().finish()
        }
    };

    let (http_req, _) = req.into_parts();
    ServiceResponse::new(http_req, response.map_into_right_body())
}

// ============================================================================
// Tests
// ============================================================================
