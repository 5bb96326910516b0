//! Routes excluded from authentication.

use actix_web::{get, HttpResponse, Responder};

#[get("/rest")]
pub async fn rest() -> impl Responder {
    HttpResponse::Ok().body("rest")
}
