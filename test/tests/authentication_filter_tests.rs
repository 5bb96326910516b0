//! Authentication redirect filter tests.
//!
//! Covers the pass-through/redirect decision: URL exclusion, cached
//! session assertions, incoming tickets and gateway loop prevention.

mod common;

use actix_web::http::StatusCode;
use actix_web::test;

use common::{cas_config, create_default_app, location, session_cookie, StubValidator, LOGIN_URL};

// =============================================================================
// Exclusion Pattern Tests
// =============================================================================

#[actix_web::test]
async fn excluded_request_is_a_no_op() {
    let app = create_default_app(cas_config().ignore_pattern("/rest"), StubValidator::empty()).await;

    let req = test::TestRequest::get().uri("/rest").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"rest");
}

#[actix_web::test]
async fn excluded_request_ignores_ticket_and_session_state() {
    let app = create_default_app(cas_config().ignore_pattern("/rest"), StubValidator::empty()).await;

    // Even with a ticket parameter, nothing in the chain touches it.
    let req = test::TestRequest::get()
        .uri("/rest?ticket=ST-ignored")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

// =============================================================================
// Redirect Tests
// =============================================================================

#[actix_web::test]
async fn unauthenticated_request_redirects_to_login() {
    let app = create_default_app(cas_config(), StubValidator::empty()).await;

    let req = test::TestRequest::get().uri("/protected").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(&resp),
        format!("{}?service=http%3A%2F%2Fhost%2Fprotected", LOGIN_URL)
    );
}

#[actix_web::test]
async fn renew_appends_parameter_to_redirect() {
    let app = create_default_app(cas_config().renew(true), StubValidator::empty()).await;

    let req = test::TestRequest::get().uri("/protected").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).ends_with("&renew=true"));
}

#[actix_web::test]
async fn explicit_login_url_is_used_verbatim() {
    let config = actix_cas_core::http::cas::CasConfig::new()
        .cas_server_login_url("https://sso.example.org/signin")
        .server_name("http://host");
    // No URL prefix, so the validation filter gets a stub instead.
    let app = create_default_app(config, StubValidator::empty()).await;

    let req = test::TestRequest::get().uri("/protected").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).starts_with("https://sso.example.org/signin?service="));
}

// =============================================================================
// Pass-through Tests
// =============================================================================

#[actix_web::test]
async fn request_with_ticket_is_passed_to_validation() {
    let stub = StubValidator::issuing("ST-1", "alice");
    let app = create_default_app(cas_config(), stub.clone()).await;

    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-1")
        .to_request();
    let resp = test::call_service(&app, req).await;

    // Not a login redirect: the validation filter consumed the ticket and
    // redirected back to the ticket-stripped service URL.
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "http://host/protected");
    assert_eq!(stub.calls(), 1);
}

#[actix_web::test]
async fn session_assertion_skips_redirect_and_validation() {
    let stub = StubValidator::issuing("ST-1", "alice");
    let app = create_default_app(cas_config(), stub.clone()).await;

    let login = test::TestRequest::get()
        .uri("/protected?ticket=ST-1")
        .to_request();
    let resp = test::call_service(&app, login).await;
    let cookie = session_cookie(&resp);

    let req = test::TestRequest::get()
        .uri("/protected")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"Hello, alice!");
    // No second validation round-trip happened.
    assert_eq!(stub.calls(), 1);
}

// =============================================================================
// Gateway Tests
// =============================================================================

#[actix_web::test]
async fn gateway_redirects_once_then_passes_through() {
    let app = create_default_app(cas_config().gateway(true), StubValidator::empty()).await;

    let req = test::TestRequest::get().uri("/protected").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).ends_with("&gateway=true"));
    let cookie = session_cookie(&resp);

    // The server bounced the browser back without a ticket. The stored
    // marker prevents a second redirect for the same service URL.
    let req = test::TestRequest::get()
        .uri("/protected")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;

    // No redirect: the request reaches the handler unauthenticated.
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn gateway_marker_does_not_cover_other_urls() {
    let app = create_default_app(cas_config().gateway(true), StubValidator::empty()).await;

    let req = test::TestRequest::get().uri("/protected").to_request();
    let resp = test::call_service(&app, req).await;
    let cookie = session_cookie(&resp);

    // A different URL still gets its own gateway round-trip.
    let req = test::TestRequest::get().uri("/").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).contains("service=http%3A%2F%2Fhost%2F"));
}
