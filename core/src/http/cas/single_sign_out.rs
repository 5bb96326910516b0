//! Single sign-out support.
//!
//! When the user logs out at the CAS server, the server POSTs a
//! `logoutRequest` form parameter to each application it issued a ticket
//! for. The payload's `SessionIndex` names the original service ticket;
//! the session created from that ticket must be terminated.
//!
//! Cookie-backed sessions cannot be invalidated from another request, so
//! the handler keeps a registry of `ticket -> session index` populated at
//! validation time and marks the index invalidated on logout. The
//! authentication filter purges any session whose index is marked, which
//! makes the very next request on that session unauthenticated.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use actix_service::{Service, Transform};
use actix_web::body::EitherBody;
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::error::PayloadError;
use actix_web::http::{header, Method};
use actix_web::web::{Bytes, BytesMut};
use actix_web::{Error, HttpMessage, HttpResponse};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use futures_util::StreamExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::http::cas::validator::element_text;

/// Upper bound on a buffered form body. Logout notifications are tiny;
/// anything larger is passed through untouched.
const MAX_LOGOUT_BODY: usize = 64 * 1024;

/// Registry wiring server-initiated logout to local sessions.
///
/// The session-lifecycle hook pair is [`record_session`] (session created
/// via successful validation) and [`on_session_destroyed`] (local logout
/// or expiry). An entry whose session ends without either hook firing is
/// a tolerated leak bounded by the session lifetime.
///
/// [`record_session`]: SingleSignOutHandler::record_session
/// [`on_session_destroyed`]: SingleSignOutHandler::on_session_destroyed
#[derive(Debug, Default)]
pub struct SingleSignOutHandler {
    sessions: Mutex<HashMap<String, String>>,
    invalidated: Mutex<HashSet<String>>,
}

impl SingleSignOutHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the session index created for a validated ticket.
    pub fn record_session(&self, ticket: &str, session_index: &str) {
        debug!("recording session for ticket {}", ticket);
        self.sessions
            .lock()
            .unwrap()
            .insert(ticket.to_string(), session_index.to_string());
    }

    /// Drops all registry state for a session that has ended.
    pub fn on_session_destroyed(&self, session_index: &str) {
        self.sessions
            .lock()
            .unwrap()
            .retain(|_, index| index != session_index);
        self.invalidated.lock().unwrap().remove(session_index);
    }

    /// Handles a logout payload. Returns `true` when a mapped session was
    /// marked for termination.
    pub fn process_logout_message(&self, logout_message: &str) -> bool {
        let Some(ticket) = element_text(logout_message, "SessionIndex") else {
            warn!("logout request without a SessionIndex element");
            return false;
        };
        match self.sessions.lock().unwrap().remove(&ticket) {
            Some(session_index) => {
                debug!("terminating session mapped to ticket {}", ticket);
                self.invalidated.lock().unwrap().insert(session_index);
                true
            }
            None => {
                debug!("no session mapped to ticket {}", ticket);
                false
            }
        }
    }

    /// Whether the session index was invalidated by a logout notification.
    /// A positive answer consumes the mark; the caller purges the session.
    pub fn take_invalidated(&self, session_index: &str) -> bool {
        self.invalidated.lock().unwrap().remove(session_index)
    }
}

/// Fresh random session index for the sign-out registry.
pub(crate) fn generate_session_index() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Middleware intercepting single sign-out notifications.
///
/// POSTed forms carrying the logout parameter are consumed and answered
/// with an empty 200; every other request continues down the chain with
/// its body intact.
#[derive(Clone)]
pub struct CasSingleSignOutFilter {
    handler: Arc<SingleSignOutHandler>,
    logout_parameter_name: String,
}

impl CasSingleSignOutFilter {
    pub fn new(handler: Arc<SingleSignOutHandler>) -> Self {
        CasSingleSignOutFilter {
            handler,
            logout_parameter_name: "logoutRequest".to_string(),
        }
    }

    pub fn logout_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.logout_parameter_name = name.into();
        self
    }

    pub fn handler(&self) -> Arc<SingleSignOutHandler> {
        Arc::clone(&self.handler)
    }
}

impl<S, B> Transform<S, ServiceRequest> for CasSingleSignOutFilter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = CasSingleSignOutService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CasSingleSignOutService {
            service: Rc::new(service),
            handler: Arc::clone(&self.handler),
            logout_parameter_name: self.logout_parameter_name.clone(),
        })
    }
}

pub struct CasSingleSignOutService<S> {
    service: Rc<S>,
    handler: Arc<SingleSignOutHandler>,
    logout_parameter_name: String,
}

impl<S, B> Service<ServiceRequest> for CasSingleSignOutService<S>
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
        let handler = Arc::clone(&self.handler);
        let logout_parameter_name = self.logout_parameter_name.clone();

        Box::pin(async move {
            let mut req = req;
            if req.method() == Method::POST && is_form_urlencoded(&req) {
                let mut payload = req.take_payload();
                let mut body = BytesMut::new();
                let mut truncated = false;
                while let Some(chunk) = payload.next().await {
                    let chunk = chunk?;
                    if body.len() + chunk.len() > MAX_LOGOUT_BODY {
                        body.extend_from_slice(&chunk);
                        truncated = true;
                        break;
                    }
                    body.extend_from_slice(&chunk);
                }

                let logout_message = if truncated {
                    None
                } else {
                    form_urlencoded::parse(&body)
                        .find(|(name, _)| name == logout_parameter_name.as_str())
                        .map(|(_, value)| value.into_owned())
                };

                if let Some(message) = logout_message {
                    debug!("received single sign-out notification");
                    handler.process_logout_message(&message);
                    let response = HttpResponse::Ok().finish().map_into_right_body();
                    let (http_req, _) = req.into_parts();
                    return Ok(ServiceResponse::new(http_req, response));
                }

                // Not a logout notification: hand the body back untouched.
                reinject_body(&mut req, body.freeze(), payload);
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

fn is_form_urlencoded(req: &ServiceRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

fn reinject_body(req: &mut ServiceRequest, body: Bytes, rest: Payload) {
    let prefix = futures_util::stream::once(async move { Ok::<Bytes, PayloadError>(body) });
    let merged = prefix.chain(rest);
    req.set_payload(Payload::Stream {
        payload: Box::pin(merged),
    });
}

// ============================================================================
// Tests
// ============================================================================
