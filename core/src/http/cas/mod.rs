//! CAS single sign-on client.
//!
//! Actix Web middleware implementing the client side of the CAS
//! browser-redirect protocol: redirect unauthenticated requests to the
//! central login page, exchange the returned service ticket for a
//! verified assertion, cache it in the session, and honor server-pushed
//! single sign-out.
//!
//! # Module Structure
//!
//! - `assertion` - Assertion and principal model
//! - `authentication` - Authentication redirect filter
//! - `cipher` - Symmetric cipher for proxy-granting tickets at rest
//! - `config` - Configuration (`CasConfig`, protocol parameter names)
//! - `extractor` - Handler extractors (`CasPrincipal`, `OptionalCasPrincipal`)
//! - `gateway` - Gateway (silent authentication) bookkeeping
//! - `pgt` - Proxy-granting ticket storage and background expiry
//! - `single_sign_out` - Single sign-out registry and filter
//! - `url_matcher` - URL exclusion matching (CONTAINS / REGEX / EXACT)
//! - `urls` - Service and redirect URL construction
//! - `validation` - Ticket validation filter
//! - `validator` - Ticket validators and proxy ticket retrieval
//!
//! # Filter order
//!
//! Session middleware outermost, then the authentication filter, then the
//! validation filter. With actix's wrap semantics (last registered runs
//! first):
//!
//! ```ignore
//! App::new()
//!     .wrap(validation_filter)
//!     .wrap(authentication_filter)
//!     .wrap(single_sign_out_filter)
//!     .wrap(session_middleware)
//! ```

// Re-exports for convenience
pub use assertion::{
    Assertion, AttributePrincipal, CAS_ASSERTION_SESSION_KEY, CAS_SESSION_INDEX_KEY,
};
pub use authentication::CasAuthenticationFilter;
pub use cipher::{CasCipher, CipherAlgorithm};
pub use config::{CasConfig, CasProtocol, HostnameVerification, RESERVED_INIT_PARAMS};
pub use extractor::{CasPrincipal, OptionalCasPrincipal};
pub use gateway::{DefaultGatewayStorage, GatewayResolver, CAS_GATEWAY_SESSION_KEY};
pub use pgt::{
    CleanupScheduler, EncryptedProxyGrantingTicketStorage, InMemoryProxyGrantingTicketStorage,
    ProxyGrantingTicketStorage,
};
pub use single_sign_out::{CasSingleSignOutFilter, SingleSignOutHandler};
pub use url_matcher::UrlPatternMatcher;
pub use urls::{construct_redirect_url, construct_service_url};
pub use validation::{CasValidationFilter, ValidationFailureHook, ValidationSuccessHook};
pub use validator::{
    Cas20ProxyRetriever, Cas20ProxyTicketValidator, Cas20ServiceTicketValidator, TicketValidator,
};

pub mod assertion;
pub mod authentication;
pub mod cipher;
pub mod config;
pub mod extractor;
pub mod gateway;
pub mod pgt;
pub mod single_sign_out;
pub mod url_matcher;
pub mod urls;
pub mod validation;
pub mod validator;
