//! CAS client configuration.
//!
//! A single [`CasConfig`] value drives every component; the filters take it
//! by value at construction and fail fast on inconsistent settings. There
//! is no per-request configuration lookup.
//!
//! # Example
//!
//! ```rust
//! use actix_cas_core::http::cas::CasConfig;
//!
//! let config = CasConfig::new()
//!     .cas_server_url_prefix("https://cas.example.org/cas")
//!     .server_name("http://app.example.org:8080");
//! assert!(config.validate().is_ok());
//! assert_eq!(config.login_url().unwrap(), "https://cas.example.org/cas/login");
//! ```

use std::collections::HashMap;

use crate::http::cas::cipher::{CasCipher, CipherAlgorithm};
use crate::http::cas::url_matcher::UrlPatternMatcher;
use crate::http::error::CasError;

/// Protocol variant, selecting the validation endpoint.
///
/// `Cas2` validates against `/serviceValidate`; `Cas3` against
/// `/p3/serviceValidate`, which releases principal attributes on servers
/// that support it. The artifact, service and logout parameter names are
/// the same for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CasProtocol {
    #[default]
    Cas2,
    Cas3,
}

impl CasProtocol {
    pub fn artifact_parameter(&self) -> &'static str {
        "ticket"
    }

    pub fn service_parameter(&self) -> &'static str {
        "service"
    }

    pub fn logout_parameter(&self) -> &'static str {
        "logoutRequest"
    }

    /// Path of the ticket-validation endpoint, relative to the server URL
    /// prefix.
    pub fn validation_endpoint(&self) -> &'static str {
        match self {
            CasProtocol::Cas2 => "serviceValidate",
            CasProtocol::Cas3 => "p3/serviceValidate",
        }
    }
}

/// Hostname-verification mode for the validation transport, resolved once
/// at startup from a configured name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostnameVerification {
    /// Standard TLS hostname verification.
    #[default]
    Default,
    /// Skip hostname verification but still verify the certificate chain.
    AllowAll,
    /// Skip hostname and certificate verification. Test rigs only.
    TrustAll,
}

impl HostnameVerification {
    pub fn from_name(name: &str) -> Result<Self, CasError> {
        match name {
            "default" => Ok(HostnameVerification::Default),
            "allow-all" | "allowAll" => Ok(HostnameVerification::AllowAll),
            "trust-all" | "trustAll" => Ok(HostnameVerification::TrustAll),
            other => Err(CasError::configuration(format!(
                "unknown hostnameVerifier [{}]; expected default, allow-all or trust-all",
                other
            ))),
        }
    }
}

/// Init parameters consumed by the protocol itself. Anything outside this
/// set is forwarded to the CAS server as a custom validation parameter.
pub const RESERVED_INIT_PARAMS: &[&str] = &[
    "casServerLoginUrl",
    "casServerUrlPrefix",
    "serverName",
    "service",
    "renew",
    "gateway",
    "useSession",
    "redirectAfterValidation",
    "exceptionOnValidationFailure",
    "encodeServiceUrl",
    "encoding",
    "ignorePattern",
    "ignoreUrlPatternType",
    "ignoreCase",
    "proxyReceptorUrl",
    "proxyCallbackUrl",
    "millisBetweenCleanUps",
    "acceptAnyProxy",
    "allowedProxyChains",
    "cipherAlgorithm",
    "secretKey",
    "hostnameVerifier",
    "hostnameVerifierConfig",
    "logoutParameterName",
];

/// Configuration for the CAS filters.
///
/// Built with the builder methods below or parsed from a string map with
/// [`CasConfig::from_init_params`]. [`CasConfig::validate`] enforces the
/// startup invariants; the filter constructors call it for you.
#[derive(Debug, Clone)]
pub struct CasConfig {
    pub protocol: CasProtocol,
    /// Full login URL of the CAS server. Exactly one of this and
    /// `cas_server_url_prefix` must be set.
    pub cas_server_login_url: Option<String>,
    /// Base URL of the CAS server, from which the login and validation
    /// endpoints are derived.
    pub cas_server_url_prefix: Option<String>,
    /// Scheme + host (+ port) of this application, used to rebuild the
    /// service URL from the incoming request. Exactly one of this and
    /// `service` must be set.
    pub server_name: Option<String>,
    /// Fixed service URL overriding per-request construction.
    pub service: Option<String>,
    /// Ask the server for a fresh credential check on every redirect and
    /// validation.
    pub renew: bool,
    /// Gateway (silent) authentication mode.
    pub gateway: bool,
    /// Optional token mixed into stored gateway markers.
    pub gateway_storage_salt: Option<String>,
    /// Cache the assertion in the session after validation.
    pub use_session: bool,
    /// Redirect to the ticket-stripped service URL after validation.
    pub redirect_after_validation: bool,
    /// Propagate validation failures as errors instead of writing a 403
    /// response directly.
    pub exception_on_validation_failure: bool,
    /// Percent-encode the service URL when placing it in the login
    /// redirect.
    pub encode_service_url: bool,
    /// Character encoding for URL construction. Only UTF-8 is supported.
    pub encoding: String,
    /// Exclusion pattern; requests whose full URL matches are passed
    /// through untouched.
    pub ignore_pattern: Option<String>,
    /// Matching strategy for `ignore_pattern`: CONTAINS, REGEX or EXACT.
    pub ignore_url_pattern_type: String,
    /// Case-insensitive matching for the EXACT strategy.
    pub ignore_pattern_ignore_case: bool,
    /// Path suffix identifying proxy-granting-ticket callback requests.
    pub proxy_receptor_url: Option<String>,
    /// Callback URL sent to the server as `pgtUrl` during validation.
    pub proxy_callback_url: Option<String>,
    /// Accept any proxy chain in validation responses.
    pub accept_any_proxy: bool,
    /// Proxy chains accepted in validation responses. Each inner vector is
    /// one chain, most recent proxy first.
    pub allowed_proxy_chains: Vec<Vec<String>>,
    /// Period of the proxy-granting-ticket cleanup task.
    pub millis_between_clean_ups: u64,
    /// Age past which stored proxy-granting tickets are evicted.
    pub pgt_retention_millis: u64,
    /// Cipher name for encrypted proxy-granting-ticket storage.
    pub cipher_algorithm: String,
    /// Base64-encoded key enabling encrypted proxy-granting-ticket
    /// storage.
    pub secret_key: Option<String>,
    pub hostname_verification: HostnameVerification,
    pub connect_timeout_millis: u64,
    pub read_timeout_millis: u64,
    /// Form parameter carrying single sign-out notifications.
    pub logout_parameter_name: String,
    /// Extra query parameters forwarded to the validation endpoint.
    pub custom_validation_params: HashMap<String, String>,
}

impl Default for CasConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CasConfig {
    pub fn new() -> Self {
        CasConfig {
            protocol: CasProtocol::default(),
            cas_server_login_url: None,
            cas_server_url_prefix: None,
            server_name: None,
            service: None,
            renew: false,
            gateway: false,
            gateway_storage_salt: None,
            use_session: true,
            redirect_after_validation: true,
            exception_on_validation_failure: false,
            encode_service_url: true,
            encoding: "UTF-8".to_string(),
            ignore_pattern: None,
            ignore_url_pattern_type: "CONTAINS".to_string(),
            ignore_pattern_ignore_case: false,
            proxy_receptor_url: None,
            proxy_callback_url: None,
            accept_any_proxy: false,
            allowed_proxy_chains: Vec::new(),
            millis_between_clean_ups: 60_000,
            pgt_retention_millis: 60_000,
            cipher_algorithm: "aes-256-gcm".to_string(),
            secret_key: None,
            hostname_verification: HostnameVerification::Default,
            connect_timeout_millis: 5_000,
            read_timeout_millis: 10_000,
            logout_parameter_name: "logoutRequest".to_string(),
            custom_validation_params: HashMap::new(),
        }
    }

    pub fn protocol(mut self, protocol: CasProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn cas_server_login_url(mut self, url: impl Into<String>) -> Self {
        self.cas_server_login_url = Some(url.into());
        self
    }

    pub fn cas_server_url_prefix(mut self, url: impl Into<String>) -> Self {
        self.cas_server_url_prefix = Some(url.into());
        self
    }

    /// Trailing slashes are dropped, as the service URL is appended to it.
    pub fn server_name(mut self, server_name: impl Into<String>) -> Self {
        let server_name = server_name.into();
        self.server_name = Some(server_name.trim_end_matches('/').to_string());
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn renew(mut self, renew: bool) -> Self {
        self.renew = renew;
        self
    }

    pub fn gateway(mut self, gateway: bool) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn gateway_storage_salt(mut self, salt: impl Into<String>) -> Self {
        self.gateway_storage_salt = Some(salt.into());
        self
    }

    pub fn use_session(mut self, use_session: bool) -> Self {
        self.use_session = use_session;
        self
    }

    pub fn redirect_after_validation(mut self, redirect: bool) -> Self {
        self.redirect_after_validation = redirect;
        self
    }

    pub fn exception_on_validation_failure(mut self, raise: bool) -> Self {
        self.exception_on_validation_failure = raise;
        self
    }

    pub fn encode_service_url(mut self, encode: bool) -> Self {
        self.encode_service_url = encode;
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn ignore_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_pattern = Some(pattern.into());
        self
    }

    pub fn ignore_url_pattern_type(mut self, type_name: impl Into<String>) -> Self {
        self.ignore_url_pattern_type = type_name.into();
        self
    }

    pub fn ignore_pattern_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_pattern_ignore_case = ignore_case;
        self
    }

    pub fn proxy_receptor_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_receptor_url = Some(url.into());
        self
    }

    pub fn proxy_callback_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_callback_url = Some(url.into());
        self
    }

    pub fn accept_any_proxy(mut self, accept: bool) -> Self {
        self.accept_any_proxy = accept;
        self
    }

    pub fn allowed_proxy_chain(mut self, chain: Vec<String>) -> Self {
        self.allowed_proxy_chains.push(chain);
        self
    }

    pub fn millis_between_clean_ups(mut self, millis: u64) -> Self {
        self.millis_between_clean_ups = millis;
        self
    }

    pub fn pgt_retention_millis(mut self, millis: u64) -> Self {
        self.pgt_retention_millis = millis;
        self
    }

    pub fn cipher_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.cipher_algorithm = algorithm.into();
        self
    }

    pub fn secret_key(mut self, base64_key: impl Into<String>) -> Self {
        self.secret_key = Some(base64_key.into());
        self
    }

    pub fn hostname_verification(mut self, mode: HostnameVerification) -> Self {
        self.hostname_verification = mode;
        self
    }

    pub fn connect_timeout_millis(mut self, millis: u64) -> Self {
        self.connect_timeout_millis = millis;
        self
    }

    pub fn read_timeout_millis(mut self, millis: u64) -> Self {
        self.read_timeout_millis = millis;
        self
    }

    pub fn logout_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.logout_parameter_name = name.into();
        self
    }

    pub fn custom_validation_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.custom_validation_params.insert(name.into(), value.into());
        self
    }

    /// Enforces the startup invariants. Filter constructors call this;
    /// violations never surface per request.
    pub fn validate(&self) -> Result<(), CasError> {
        match (&self.cas_server_login_url, &self.cas_server_url_prefix) {
            (Some(_), Some(_)) => {
                return Err(CasError::configuration(
                    "casServerLoginUrl and casServerUrlPrefix cannot both be set; set exactly one",
                ))
            }
            (None, None) => {
                return Err(CasError::configuration(
                    "one of casServerLoginUrl and casServerUrlPrefix must be set",
                ))
            }
            _ => {}
        }

        match (&self.server_name, &self.service) {
            (Some(_), Some(_)) => {
                return Err(CasError::configuration(
                    "serverName and service cannot both be set; set exactly one",
                ))
            }
            (None, None) => {
                return Err(CasError::configuration(
                    "one of serverName and service must be set",
                ))
            }
            _ => {}
        }

        let encoding = self.encoding.replace('-', "");
        if !encoding.eq_ignore_ascii_case("utf8") {
            return Err(CasError::configuration(format!(
                "unsupported encoding [{}]; only UTF-8 is supported",
                self.encoding
            )));
        }

        if self.millis_between_clean_ups == 0 {
            return Err(CasError::configuration(
                "millisBetweenCleanUps must be greater than zero",
            ));
        }

        if let Some(key) = &self.secret_key {
            let algorithm = CipherAlgorithm::from_name(&self.cipher_algorithm)?;
            CasCipher::new(algorithm, key)?;
        }

        self.ignore_matcher()?;

        Ok(())
    }

    /// The login URL, either as configured or derived from the server URL
    /// prefix.
    pub fn login_url(&self) -> Result<String, CasError> {
        if let Some(url) = &self.cas_server_login_url {
            return Ok(url.clone());
        }
        match &self.cas_server_url_prefix {
            Some(prefix) => Ok(format!("{}/login", prefix.trim_end_matches('/'))),
            None => Err(CasError::configuration(
                "one of casServerLoginUrl and casServerUrlPrefix must be set",
            )),
        }
    }

    /// The server URL prefix, required for ticket validation.
    pub fn validation_url_prefix(&self) -> Result<&str, CasError> {
        self.cas_server_url_prefix.as_deref().ok_or_else(|| {
            CasError::configuration("casServerUrlPrefix must be set for ticket validation")
        })
    }

    /// The exclusion matcher, when an ignore pattern is configured.
    pub fn ignore_matcher(&self) -> Result<Option<UrlPatternMatcher>, CasError> {
        match &self.ignore_pattern {
            Some(pattern) => UrlPatternMatcher::from_type(
                &self.ignore_url_pattern_type,
                pattern,
                self.ignore_pattern_ignore_case,
            )
            .map(Some),
            None => Ok(None),
        }
    }

    /// Builds a configuration from a string parameter map, the shape the
    /// hosting framework hands over at startup.
    ///
    /// Known parameter names are parsed (malformed values fail fast);
    /// anything outside [`RESERVED_INIT_PARAMS`] is forwarded to the server
    /// as a custom validation parameter.
    pub fn from_init_params(params: &HashMap<String, String>) -> Result<Self, CasError> {
        let mut config = CasConfig::new();

        for (name, value) in params {
            match name.as_str() {
                "casServerLoginUrl" => config.cas_server_login_url = Some(value.clone()),
                "casServerUrlPrefix" => config.cas_server_url_prefix = Some(value.clone()),
                "serverName" => {
                    config.server_name = Some(value.trim_end_matches('/').to_string())
                }
                "service" => config.service = Some(value.clone()),
                "renew" => config.renew = parse_bool(name, value)?,
                "gateway" => config.gateway = parse_bool(name, value)?,
                "useSession" => config.use_session = parse_bool(name, value)?,
                "redirectAfterValidation" => {
                    config.redirect_after_validation = parse_bool(name, value)?
                }
                "exceptionOnValidationFailure" => {
                    config.exception_on_validation_failure = parse_bool(name, value)?
                }
                "encodeServiceUrl" => config.encode_service_url = parse_bool(name, value)?,
                "encoding" => config.encoding = value.clone(),
                "ignorePattern" => config.ignore_pattern = Some(value.clone()),
                "ignoreUrlPatternType" => config.ignore_url_pattern_type = value.clone(),
                "ignoreCase" => config.ignore_pattern_ignore_case = parse_bool(name, value)?,
                "proxyReceptorUrl" => config.proxy_receptor_url = Some(value.clone()),
                "proxyCallbackUrl" => config.proxy_callback_url = Some(value.clone()),
                "millisBetweenCleanUps" => {
                    config.millis_between_clean_ups = parse_u64(name, value)?
                }
                "acceptAnyProxy" => config.accept_any_proxy = parse_bool(name, value)?,
                "allowedProxyChains" => {
                    config.allowed_proxy_chains = parse_proxy_chains(value)
                }
                "cipherAlgorithm" => config.cipher_algorithm = value.clone(),
                "secretKey" => config.secret_key = Some(value.clone()),
                "hostnameVerifier" => {
                    config.hostname_verification = HostnameVerification::from_name(value)?
                }
                "hostnameVerifierConfig" => {
                    if !value.is_empty() {
                        return Err(CasError::configuration(
                            "the built-in hostname verifiers take no hostnameVerifierConfig",
                        ));
                    }
                }
                "logoutParameterName" => config.logout_parameter_name = value.clone(),
                _ => {
                    config
                        .custom_validation_params
                        .insert(name.clone(), value.clone());
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, CasError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(CasError::configuration(format!(
            "parameter [{}] must be true or false, got [{}]",
            name, value
        ))),
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64, CasError> {
    value.parse::<u64>().map_err(|_| {
        CasError::configuration(format!(
            "parameter [{}] must be a non-negative integer, got [{}]",
            name, value
        ))
    })
}

/// Chains are separated by newlines, chain entries by whitespace.
fn parse_proxy_chains(value: &str) -> Vec<Vec<String>> {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
