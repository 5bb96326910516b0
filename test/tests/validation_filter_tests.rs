//! Ticket validation filter tests.
//!
//! Covers assertion creation, session binding, redirect-after-validation,
//! failure handling and ticket replay.

mod common;

use actix_web::http::StatusCode;
use actix_web::test;

use common::{cas_config, create_default_app, location, session_cookie, StubValidator};

// =============================================================================
// Successful Validation
// =============================================================================

#[actix_web::test]
async fn valid_ticket_creates_session_and_redirects() {
    let stub = StubValidator::issuing("ST-123", "alice");
    let app = create_default_app(cas_config(), stub).await;

    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-123")
        .to_request();
    let resp = test::call_service(&app, req).await;

    // Ticket stripped from the redirect target.
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "http://host/protected");
    let cookie = session_cookie(&resp);

    // The session now holds the assertion for principal alice.
    let req = test::TestRequest::get()
        .uri("/protected")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"Hello, alice!");
}

#[actix_web::test]
async fn validation_without_redirect_continues_the_chain() {
    let stub = StubValidator::issuing("ST-123", "alice");
    let app = create_default_app(cas_config().redirect_after_validation(false), stub).await;

    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-123")
        .to_request();
    let resp = test::call_service(&app, req).await;

    // The assertion is available to the handler on this very request.
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"Hello, alice!");
}

#[actix_web::test]
async fn query_parameters_survive_the_post_validation_redirect() {
    let stub = StubValidator::issuing("ST-123", "alice");
    let app = create_default_app(cas_config(), stub).await;

    let req = test::TestRequest::get()
        .uri("/protected?tab=2&ticket=ST-123")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "http://host/protected?tab=2");
}

// =============================================================================
// Failed Validation
// =============================================================================

#[actix_web::test]
async fn invalid_ticket_yields_403_with_reason() {
    let app = create_default_app(cas_config(), StubValidator::empty()).await;

    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-bogus")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = test::read_body(resp).await;
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("INVALID_TICKET"));
    assert!(body.contains("ST-bogus"));
}

#[actix_web::test]
async fn failed_validation_leaves_the_session_unauthenticated() {
    let app = create_default_app(cas_config(), StubValidator::empty()).await;

    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-bogus")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The next request on the same (empty) session is redirected to login.
    let req = test::TestRequest::get().uri("/protected").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).contains("/login?service="));
}

#[actix_web::test]
async fn replayed_ticket_is_rejected() {
    let stub = StubValidator::issuing("ST-123", "alice");
    let app = create_default_app(cas_config(), stub.clone()).await;

    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-123")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    // Same ticket from a different client (no session cookie): the server
    // already consumed it, and the failure is surfaced, not retried.
    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-123")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(stub.calls(), 2);
}

#[actix_web::test]
async fn exception_mode_propagates_the_failure() {
    let app = create_default_app(
        cas_config().exception_on_validation_failure(true),
        StubValidator::empty(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-bogus")
        .to_request();
    let err = test::try_call_service(&app, req)
        .await
        .expect_err("validation failure should propagate");

    assert_eq!(
        err.as_response_error().status_code(),
        StatusCode::FORBIDDEN
    );
}

// =============================================================================
// Pass-through
// =============================================================================

#[actix_web::test]
async fn request_without_ticket_is_untouched_by_validation() {
    let stub = StubValidator::empty();
    let app = create_default_app(cas_config(), stub.clone()).await;

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;

    // The authentication filter redirects, but no validation call happened.
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(stub.calls(), 0);
}
