//! # Actix CAS Client
//!
//! Client-side implementation of the CAS single sign-on protocol for
//! Actix Web applications.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use actix_cas_core::http::cas::{
//!     CasAuthenticationFilter, CasConfig, CasPrincipal, CasSingleSignOutFilter,
//!     CasValidationFilter, SingleSignOutHandler,
//! };
//! use actix_session::storage::CookieSessionStore;
//! use actix_session::SessionMiddleware;
//! use actix_web::cookie::Key;
//! use actix_web::{get, App, HttpServer, Responder};
//!
//! #[get("/protected")]
//! async fn protected(principal: CasPrincipal) -> impl Responder {
//!     format!("Hello, {}!", principal.name)
//! }
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = CasConfig::new()
//!         .cas_server_url_prefix("https://cas.example.org/cas")
//!         .server_name("http://app.example.org:8080");
//!
//!     let sign_out = Arc::new(SingleSignOutHandler::new());
//!     let authentication = CasAuthenticationFilter::new(config.clone())
//!         .expect("CAS configuration")
//!         .single_sign_out(Arc::clone(&sign_out));
//!     let validation = CasValidationFilter::new(config)
//!         .expect("CAS configuration")
//!         .single_sign_out(Arc::clone(&sign_out));
//!     let _cleanup = validation.start_cleanup();
//!
//!     let session_key = Key::generate();
//!     HttpServer::new(move || {
//!         App::new()
//!             .service(protected)
//!             .wrap(validation.clone())
//!             .wrap(authentication.clone())
//!             .wrap(CasSingleSignOutFilter::new(Arc::clone(&sign_out)))
//!             .wrap(SessionMiddleware::new(
//!                 CookieSessionStore::default(),
//!                 session_key.clone(),
//!             ))
//!     })
//!     .bind(("0.0.0.0", 8080))?
//!     .run()
//!     .await
//! }
//! ```

pub mod http;
