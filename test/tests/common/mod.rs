//! Common test utilities and configuration.
//!
//! Provides the shared test infrastructure: a stub ticket validator that
//! honors the server's single-use ticket contract, handlers, and an app
//! factory wiring the full filter chain (session middleware outermost,
//! then single sign-out, authentication, validation).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_session::storage::CookieSessionStore;
use actix_session::SessionMiddleware;
use actix_web::body::MessageBody;
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header;
use actix_web::{get, post, test, web, App, Error, HttpResponse, Responder};
use async_trait::async_trait;

use actix_cas_core::http::cas::{
    Assertion, AttributePrincipal, CasAuthenticationFilter, CasConfig, CasPrincipal,
    CasSingleSignOutFilter, CasValidationFilter, OptionalCasPrincipal, SingleSignOutHandler,
    TicketValidator,
};
use actix_cas_core::http::error::CasError;

pub const LOGIN_URL: &str = "https://cas.example.org/cas/login";

/// Base configuration used by most tests: URL prefix + server name.
pub fn cas_config() -> CasConfig {
    CasConfig::new()
        .cas_server_url_prefix("https://cas.example.org/cas")
        .server_name("http://host")
}

// =============================================================================
// Stub Validator
// =============================================================================

/// Validator honoring the remote server's contract without the network:
/// each issued ticket validates exactly once, a second attempt (or an
/// unknown ticket) fails with `INVALID_TICKET`.
pub struct StubValidator {
    tickets: Mutex<HashMap<String, AttributePrincipal>>,
    calls: AtomicUsize,
}

impl StubValidator {
    pub fn empty() -> Arc<Self> {
        Arc::new(StubValidator {
            tickets: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    /// A stub that will accept `ticket` once, for the named principal.
    pub fn issuing(ticket: &str, principal: &str) -> Arc<Self> {
        let stub = Self::empty();
        stub.add_ticket(ticket, AttributePrincipal::new(principal));
        stub
    }

    pub fn add_ticket(&self, ticket: &str, principal: AttributePrincipal) {
        self.tickets
            .lock()
            .unwrap()
            .insert(ticket.to_string(), principal);
    }

    /// Number of validation round-trips performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl TicketValidator for StubValidator {
    async fn validate(&self, ticket: &str, _service: &str) -> Result<Assertion, CasError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.tickets.lock().unwrap().remove(ticket) {
            Some(principal) => Ok(Assertion::new(principal)),
            None => Err(CasError::validation_failure(
                "INVALID_TICKET",
                format!("Ticket {} not recognized", ticket),
            )),
        }
    }
}

// =============================================================================
// Test Handlers
// =============================================================================

#[get("/")]
pub async fn index(principal: OptionalCasPrincipal) -> impl Responder {
    match principal.into_inner() {
        Some(p) => HttpResponse::Ok().body(format!("Welcome, {}!", p.name)),
        None => HttpResponse::Ok().body("Welcome, guest!"),
    }
}

#[get("/protected")]
pub async fn protected(principal: CasPrincipal) -> impl Responder {
    HttpResponse::Ok().body(format!("Hello, {}!", principal.name))
}

#[get("/rest")]
pub async fn rest() -> impl Responder {
    HttpResponse::Ok().body("rest")
}

/// Echoes the raw request body; used to prove bodies survive the
/// single sign-out filter's sniffing.
#[post("/echo")]
pub async fn echo(body: web::Bytes) -> impl Responder {
    HttpResponse::Ok().body(body)
}

// =============================================================================
// Test App Builder
// =============================================================================

fn session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[0u8; 64]))
        .cookie_secure(false)
        .build()
}

/// Creates a fully configured test application: session middleware
/// outermost, then single sign-out, authentication and validation.
pub async fn create_app(
    authentication: CasAuthenticationFilter,
    validation: CasValidationFilter,
    sign_out: Arc<SingleSignOutHandler>,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody<Error: actix_web::ResponseError>>,
    Error = Error,
> {
    test::init_service(
        App::new()
            .service(index)
            .service(protected)
            .service(rest)
            .service(echo)
            .wrap(validation)
            .wrap(authentication)
            .wrap(CasSingleSignOutFilter::new(sign_out))
            .wrap(session_middleware()),
    )
    .await
}

/// Creates the default test application around a stub validator, wiring
/// the sign-out registry into both filters.
pub async fn create_default_app(
    config: CasConfig,
    stub: Arc<StubValidator>,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody<Error: actix_web::ResponseError>>,
    Error = Error,
> {
    let sign_out = Arc::new(SingleSignOutHandler::new());
    let authentication = CasAuthenticationFilter::new(config.clone())
        .unwrap()
        .single_sign_out(Arc::clone(&sign_out));
    let validation = CasValidationFilter::with_validator(config, stub)
        .unwrap()
        .single_sign_out(Arc::clone(&sign_out));
    create_app(authentication, validation, sign_out).await
}

// =============================================================================
// Helpers
// =============================================================================

/// The session cookie set on a response.
pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Cookie<'static> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse_encoded(value.to_string()).ok())
        .find(|cookie| cookie.name() == "id")
        .expect("session cookie")
}

/// The `Location` header of a redirect response.
pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
        .to_string()
}
