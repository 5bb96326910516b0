//! CAS client demo application.
//!
//! Wires the CAS filters around a handful of routes, the way a protected
//! application would. Point the URLs at a real CAS server to exercise the
//! full redirect/validate/sign-out loop.


use std::sync::Arc;

use actix_session::storage::CookieSessionStore;
use actix_session::SessionMiddleware;
use actix_web::cookie::Key;
use actix_web::{App, HttpServer};

use actix_cas_core::http::cas::{
    CasAuthenticationFilter, CasConfig, CasSingleSignOutFilter, CasValidationFilter,
    SingleSignOutHandler,
};

fn cas_config() -> CasConfig {
    CasConfig::new()
        .cas_server_url_prefix("https://cas.example.org:8443/cas")
        .server_name("http://127.0.0.1:8082")
        .proxy_receptor_url("/proxyCallback")
}

fn print_startup_info() {
    println!("=== Actix CAS Client Demo ===");
    println!();
    println!("Server: http://127.0.0.1:8082");
    println!();
    println!("Routes:");
    println!("  GET  /           - Home (optional authentication)");
    println!("  GET  /protected  - Requires a CAS assertion");
    println!("  GET  /rest       - Excluded from authentication");
    println!("  GET  /logout     - Local logout + redirect to CAS logout");
    println!();
    println!("Unauthenticated requests to /protected are redirected to the");
    println!("CAS login page; the returned ticket is validated against the");
    println!("serviceValidate endpoint and cached in the session.");
    println!();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().init();
    print_startup_info();

    let sign_out = Arc::new(SingleSignOutHandler::new());

    let authentication = CasAuthenticationFilter::new(cas_config().ignore_pattern("/rest"))
        .expect("CAS configuration")
        .single_sign_out(Arc::clone(&sign_out));

    let validation = CasValidationFilter::new(cas_config())
        .expect("CAS configuration")
        .single_sign_out(Arc::clone(&sign_out));

    // Evicts expired proxy-granting tickets until dropped at shutdown.
    let _cleanup = validation.start_cleanup();

    let session_key = Key::generate();

    HttpServer::new(move || {
        App::new()
            .service(handlers::home::index)
            .service(handlers::home::logout)
            .service(handlers::protected::protected)
            .service(handlers::public::rest)
            .wrap(validation.clone())
            .wrap(authentication.clone())
            .wrap(CasSingleSignOutFilter::new(Arc::clone(&sign_out)))
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
                    .cookie_secure(false)
                    .build(),
            )
    })
    .bind("127.0.0.1:8082")?
    .run()
    .await
}
