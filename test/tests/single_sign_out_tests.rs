//! Single sign-out tests.
//!
//! The CAS server POSTs a `logoutRequest` form referencing the service
//! ticket a session was created from; that session must be treated as
//! unauthenticated afterwards. Unrelated POST bodies must pass through
//! the sniffing filter untouched.

mod common;

use actix_web::http::StatusCode;
use actix_web::test;

use common::{cas_config, create_default_app, location, session_cookie, StubValidator};

fn logout_request(ticket: &str) -> String {
    format!(
        r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="LR-1" Version="2.0">
  <saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">@NOT_USED@</saml:NameID>
  <samlp:SessionIndex>{}</samlp:SessionIndex>
</samlp:LogoutRequest>"#,
        ticket
    )
}

#[actix_web::test]
async fn logout_notification_terminates_the_mapped_session() {
    let stub = StubValidator::issuing("ST-77", "alice");
    let app = create_default_app(cas_config(), stub).await;

    // Log in via ticket validation; the session is mapped to ST-77.
    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-77")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let cookie = session_cookie(&resp);

    // The session works.
    let req = test::TestRequest::get()
        .uri("/protected")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Server-initiated logout referencing the original ticket.
    let req = test::TestRequest::post()
        .uri("/")
        .set_form([("logoutRequest", logout_request("ST-77"))])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // The same cookie is now unauthenticated and redirected to login.
    let req = test::TestRequest::get()
        .uri("/protected")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).contains("/login?service="));
}

#[actix_web::test]
async fn logout_for_an_unknown_ticket_leaves_sessions_alone() {
    let stub = StubValidator::issuing("ST-77", "alice");
    let app = create_default_app(cas_config(), stub).await;

    let req = test::TestRequest::get()
        .uri("/protected?ticket=ST-77")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let cookie = session_cookie(&resp);

    let req = test::TestRequest::post()
        .uri("/")
        .set_form([("logoutRequest", logout_request("ST-other"))])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/protected")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn unrelated_form_posts_keep_their_body() {
    let stub = StubValidator::issuing("ST-77", "alice");
    let app = create_default_app(cas_config().ignore_pattern("/echo"), stub).await;

    let req = test::TestRequest::post()
        .uri("/echo")
        .insert_header(("content-type", "application/x-www-form-urlencoded"))
        .set_payload("a=1&b=two")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"a=1&b=two");
}

#[actix_web::test]
async fn non_form_posts_are_not_sniffed() {
    let app = create_default_app(
        cas_config().ignore_pattern("/echo"),
        StubValidator::empty(),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/echo")
        .insert_header(("content-type", "application/json"))
        .set_payload(r#"{"logoutRequest": "not a logout"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], br#"{"logoutRequest": "not a logout"}"#);
}
