//! Ticket validation against the CAS server.
//!
//! A [`TicketValidator`] exchanges a service ticket for an [`Assertion`]
//! via `GET {prefix}/serviceValidate?service=<url>&ticket=<ticket>`.
//! Two implementations are provided: [`Cas20ServiceTicketValidator`] for
//! plain deployments and [`Cas20ProxyTicketValidator`] when proxy chains
//! must be accepted and screened. [`Cas20ProxyRetriever`] obtains proxy
//! tickets from `/proxy` using a previously delivered proxy-granting
//! ticket.
//!
//! The server's XML payloads are small and flat; they are read with the
//! same string-extraction approach used elsewhere in this crate rather
//! than a full XML stack.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::http::cas::assertion::{Assertion, AttributePrincipal};
use crate::http::cas::config::{CasConfig, CasProtocol, HostnameVerification};
use crate::http::cas::pgt::ProxyGrantingTicketStorage;
use crate::http::error::CasError;

/// Exchanges a service ticket for a verified assertion.
#[async_trait(?Send)]
pub trait TicketValidator: Send + Sync {
    async fn validate(&self, ticket: &str, service: &str) -> Result<Assertion, CasError>;
}

/// Builds the HTTP client used for server round-trips, honoring the
/// configured timeouts and hostname-verification mode.
pub(crate) fn build_http_client(config: &CasConfig) -> Result<reqwest::Client, CasError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(config.connect_timeout_millis))
        .timeout(Duration::from_millis(config.read_timeout_millis));

    match config.hostname_verification {
        HostnameVerification::Default => {}
        HostnameVerification::AllowAll => {
            builder = builder.danger_accept_invalid_hostnames(true);
        }
        HostnameVerification::TrustAll => {
            builder = builder
                .danger_accept_invalid_hostnames(true)
                .danger_accept_invalid_certs(true);
        }
    }

    builder
        .build()
        .map_err(|e| CasError::configuration(format!("failed to build HTTP client: {}", e)))
}

/// CAS 2.0/3.0 service ticket validator.
pub struct Cas20ServiceTicketValidator {
    validation_url_prefix: String,
    protocol: CasProtocol,
    renew: bool,
    proxy_callback_url: Option<String>,
    custom_parameters: HashMap<String, String>,
    pgt_storage: Option<Arc<dyn ProxyGrantingTicketStorage>>,
    client: reqwest::Client,
}

impl Cas20ServiceTicketValidator {
    pub fn new(
        config: &CasConfig,
        pgt_storage: Option<Arc<dyn ProxyGrantingTicketStorage>>,
    ) -> Result<Self, CasError> {
        let prefix = config
            .validation_url_prefix()?
            .trim_end_matches('/')
            .to_string();
        Ok(Cas20ServiceTicketValidator {
            validation_url_prefix: prefix,
            protocol: config.protocol,
            renew: config.renew,
            proxy_callback_url: config.proxy_callback_url.clone(),
            custom_parameters: config.custom_validation_params.clone(),
            pgt_storage,
            client: build_http_client(config)?,
        })
    }

    fn validation_url(&self, ticket: &str, service: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair(self.protocol.service_parameter(), service);
        query.append_pair(self.protocol.artifact_parameter(), ticket);
        if self.renew {
            query.append_pair("renew", "true");
        }
        if let Some(pgt_url) = &self.proxy_callback_url {
            query.append_pair("pgtUrl", pgt_url);
        }
        for (name, value) in &self.custom_parameters {
            query.append_pair(name, value);
        }
        format!(
            "{}/{}?{}",
            self.validation_url_prefix,
            self.protocol.validation_endpoint(),
            query.finish()
        )
    }

    async fn fetch(&self, url: &str) -> Result<String, CasError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CasError::transport(format!(
                "CAS server returned HTTP {} from validation endpoint",
                status
            )));
        }
        Ok(response.text().await?)
    }

    pub(crate) async fn fetch_and_parse(
        &self,
        ticket: &str,
        service: &str,
    ) -> Result<(Assertion, Vec<String>), CasError> {
        let url = self.validation_url(ticket, service);
        debug!("constructed validation url: {}", url);
        let body = self.fetch(&url).await?;
        self.parse_response(&body)
    }

    /// Parses a `cas:serviceResponse` payload into an assertion plus the
    /// proxy chain reported by the server (empty for non-proxied tickets).
    pub(crate) fn parse_response(
        &self,
        xml: &str,
    ) -> Result<(Assertion, Vec<String>), CasError> {
        if element_block(xml, "authenticationFailure").is_some() {
            let code = element_attribute(xml, "authenticationFailure", "code")
                .unwrap_or_else(|| "UNKNOWN".to_string());
            let message = element_text(xml, "authenticationFailure").unwrap_or_default();
            return Err(CasError::validation_failure(code, message));
        }

        let success = element_block(xml, "authenticationSuccess").ok_or_else(|| {
            CasError::validation_failure(
                "INVALID_RESPONSE",
                "no authentication success or failure element in CAS response",
            )
        })?;

        let user = element_text(success, "user").ok_or_else(|| {
            CasError::validation_failure("INVALID_RESPONSE", "no principal in CAS response")
        })?;

        let mut principal = AttributePrincipal::new(user);
        if let Some(block) = element_block(success, "attributes") {
            principal.attributes = parse_attributes(block);
        }

        if let Some(iou) = element_text(success, "proxyGrantingTicket") {
            match self.pgt_storage.as_ref().and_then(|s| s.retrieve(&iou)) {
                Some(pgt) => principal.proxy_granting_ticket = Some(pgt),
                None => warn!(
                    "proxy-granting ticket IOU {} not found in storage; \
                     proxy ticket issuance will fail for this assertion",
                    iou
                ),
            }
        }

        let proxies = element_block(success, "proxies")
            .map(|block| element_texts(block, "proxy"))
            .unwrap_or_default();

        Ok((Assertion::new(principal), proxies))
    }
}

#[async_trait(?Send)]
impl TicketValidator for Cas20ServiceTicketValidator {
    async fn validate(&self, ticket: &str, service: &str) -> Result<Assertion, CasError> {
        let (assertion, _) = self.fetch_and_parse(ticket, service).await?;
        Ok(assertion)
    }
}

/// Validator for deployments that accept proxied tickets.
///
/// Behaves like [`Cas20ServiceTicketValidator`] and additionally screens
/// the proxy chain in the response against the configured policy.
pub struct Cas20ProxyTicketValidator {
    inner: Cas20ServiceTicketValidator,
    accept_any_proxy: bool,
    allowed_proxy_chains: Vec<Vec<String>>,
}

impl Cas20ProxyTicketValidator {
    pub fn new(
        config: &CasConfig,
        pgt_storage: Option<Arc<dyn ProxyGrantingTicketStorage>>,
    ) -> Result<Self, CasError> {
        Ok(Cas20ProxyTicketValidator {
            inner: Cas20ServiceTicketValidator::new(config, pgt_storage)?,
            accept_any_proxy: config.accept_any_proxy,
            allowed_proxy_chains: config.allowed_proxy_chains.clone(),
        })
    }
}

fn screen_proxies(
    proxies: &[String],
    accept_any_proxy: bool,
    allowed_proxy_chains: &[Vec<String>],
) -> Result<(), CasError> {
    if proxies.is_empty() || accept_any_proxy {
        return Ok(());
    }
    if allowed_proxy_chains.iter().any(|chain| chain == proxies) {
        return Ok(());
    }
    Err(CasError::validation_failure(
        "INVALID_PROXY_CHAIN",
        format!("proxy chain {:?} is not allowed", proxies),
    ))
}

#[async_trait(?Send)]
impl TicketValidator for Cas20ProxyTicketValidator {
    async fn validate(&self, ticket: &str, service: &str) -> Result<Assertion, CasError> {
        let (assertion, proxies) = self.inner.fetch_and_parse(ticket, service).await?;
        screen_proxies(&proxies, self.accept_any_proxy, &self.allowed_proxy_chains)?;
        Ok(assertion)
    }
}

/// Obtains proxy tickets from the server's `/proxy` endpoint.
pub struct Cas20ProxyRetriever {
    url_prefix: String,
    client: reqwest::Client,
}

impl Cas20ProxyRetriever {
    pub fn new(config: &CasConfig) -> Result<Self, CasError> {
        Ok(Cas20ProxyRetriever {
            url_prefix: config
                .validation_url_prefix()?
                .trim_end_matches('/')
                .to_string(),
            client: build_http_client(config)?,
        })
    }

    /// Issues a proxy ticket for the target service using the principal's
    /// proxy-granting ticket. A principal without one (the IOU was never
    /// delivered or had already been evicted) fails only this call.
    pub async fn proxy_ticket(
        &self,
        principal: &AttributePrincipal,
        target_service: &str,
    ) -> Result<String, CasError> {
        let pgt = principal.proxy_granting_ticket.as_deref().ok_or_else(|| {
            CasError::store_inconsistency(
                "no proxy-granting ticket associated with this principal",
            )
        })?;
        self.get_proxy_ticket(pgt, target_service).await
    }

    pub async fn get_proxy_ticket(
        &self,
        pgt: &str,
        target_service: &str,
    ) -> Result<String, CasError> {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("pgt", pgt);
        query.append_pair("targetService", target_service);
        let url = format!("{}/proxy?{}", self.url_prefix, query.finish());
        debug!("requesting proxy ticket from {}", self.url_prefix);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CasError::transport(format!(
                "CAS server returned HTTP {} from proxy endpoint",
                status
            )));
        }
        let body = response.text().await?;

        if let Some(ticket) = element_text(&body, "proxyTicket") {
            return Ok(ticket);
        }
        if element_block(&body, "proxyFailure").is_some() {
            let code = element_attribute(&body, "proxyFailure", "code")
                .unwrap_or_else(|| "UNKNOWN".to_string());
            let message = element_text(&body, "proxyFailure").unwrap_or_default();
            return Err(CasError::validation_failure(code, message));
        }
        Err(CasError::transport(
            "unexpected response from CAS proxy endpoint",
        ))
    }
}

// ============================================================================
// XML extraction helpers
// ============================================================================

const NAMESPACE_PREFIXES: &[&str] = &["cas:", "samlp:", "saml:", ""];

/// Raw inner content of the first occurrence of the named element, tried
/// with the protocol's namespace prefixes.
pub(crate) fn element_block<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    for prefix in NAMESPACE_PREFIXES {
        let open = format!("<{}{}", prefix, name);
        let close = format!("</{}{}>", prefix, name);
        let mut offset = 0;
        while let Some(found) = xml[offset..].find(&open) {
            let start = offset + found;
            let after = xml[start + open.len()..].chars().next();
            match after {
                Some(c) if c == '>' || c == '/' || c.is_whitespace() => {
                    let tag_end = xml[start..].find('>')? + start + 1;
                    if xml[start..tag_end].ends_with("/>") {
                        return Some("");
                    }
                    let end = xml[tag_end..].find(&close)? + tag_end;
                    return Some(&xml[tag_end..end]);
                }
                // A longer element name that merely shares this prefix.
                _ => offset = start + open.len(),
            }
        }
    }
    None
}

/// Trimmed, entity-decoded text content of the named element.
pub(crate) fn element_text(xml: &str, name: &str) -> Option<String> {
    element_block(xml, name).map(|block| unescape_xml(block.trim()))
}

/// Value of an attribute on the named element's opening tag.
pub(crate) fn element_attribute(xml: &str, name: &str, attr: &str) -> Option<String> {
    for prefix in NAMESPACE_PREFIXES {
        let open = format!("<{}{}", prefix, name);
        if let Some(start) = xml.find(&open) {
            let tag_end = xml[start..].find('>')? + start;
            let tag = &xml[start..tag_end];
            for quote in ['"', '\''] {
                let pattern = format!("{}={}", attr, quote);
                if let Some(at) = tag.find(&pattern) {
                    let value_start = at + pattern.len();
                    let value_end = tag[value_start..].find(quote)? + value_start;
                    return Some(unescape_xml(&tag[value_start..value_end]));
                }
            }
            return None;
        }
    }
    None
}

/// Text content of every occurrence of the named element.
pub(crate) fn element_texts(xml: &str, name: &str) -> Vec<String> {
    let mut values = Vec::new();
    for prefix in NAMESPACE_PREFIXES {
        let open = format!("<{}{}>", prefix, name);
        let close = format!("</{}{}>", prefix, name);
        let mut rest = xml;
        while let Some(start) = rest.find(&open) {
            let content_start = start + open.len();
            match rest[content_start..].find(&close) {
                Some(len) => {
                    values.push(unescape_xml(rest[content_start..content_start + len].trim()));
                    rest = &rest[content_start + len + close.len()..];
                }
                None => break,
            }
        }
        if !values.is_empty() {
            break;
        }
    }
    values
}

/// Parses the children of a `cas:attributes` block into a multimap keyed
/// by local attribute name.
fn parse_attributes(block: &str) -> HashMap<String, Vec<String>> {
    let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
    let mut rest = block;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        if after.starts_with('/') {
            rest = after;
            continue;
        }
        let Some(name_len) = after.find(|c: char| c == '>' || c == '/' || c.is_whitespace())
        else {
            break;
        };
        let qualified = after[..name_len].to_string();
        let Some(tag_close) = after.find('>') else { break };
        if after[..tag_close].ends_with('/') {
            attributes
                .entry(local_name(&qualified).to_string())
                .or_default()
                .push(String::new());
            rest = &after[tag_close + 1..];
            continue;
        }
        let content = &after[tag_close + 1..];
        let close = format!("</{}>", qualified);
        let Some(end) = content.find(&close) else { break };
        attributes
            .entry(local_name(&qualified).to_string())
            .or_default()
            .push(unescape_xml(content[..end].trim()));
        rest = &content[end + close.len()..];
    }
    attributes
}

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// ============================================================================
// Tests
// ============================================================================
