//! Home and logout routes.

use actix_session::Session;
use actix_web::http::header;
use actix_web::{get, HttpResponse, Responder};

use actix_cas_core::http::cas::OptionalCasPrincipal;

/// Home page, reachable with or without an assertion.
#[get("/")]
pub async fn index(principal: OptionalCasPrincipal) -> impl Responder {
    match principal.into_inner() {
        Some(p) => HttpResponse::Ok().body(format!("Welcome, {}!", p.name)),
        None => HttpResponse::Ok().body("Welcome, guest!"),
    }
}

/// Local logout: drop the session, then send the browser to the CAS
/// logout page to end the single sign-on session too.
#[get("/logout")]
pub async fn logout(session: Session) -> impl Responder {
    session.purge();
    HttpResponse::Found()
        .insert_header((header::LOCATION, "https://cas.example.org:8443/cas/logout"))
        .finish()
}
