//! Service and redirect URL construction.
//!
//! The service URL identifies this application to the CAS server. It is
//! rebuilt from the incoming request (or taken verbatim from the `service`
//! setting) with the ticket artifact parameter stripped, so that the URL
//! sent to the server matches the URL the browser returns to.

use actix_web::dev::ServiceRequest;
use url::form_urlencoded;

use crate::http::cas::config::CasConfig;

/// The canonical service URL for this request: scheme + host + path +
/// query, with the artifact parameter removed.
pub fn construct_service_url(req: &ServiceRequest, config: &CasConfig) -> String {
    if let Some(service) = &config.service {
        return service.clone();
    }

    let base = match &config.server_name {
        Some(name) if name.contains("://") => name.clone(),
        Some(name) => {
            let scheme = req.connection_info().scheme().to_string();
            format!("{}://{}", scheme, name)
        }
        None => {
            let info = req.connection_info();
            format!("{}://{}", info.scheme(), info.host())
        }
    };

    let mut url = format!("{}{}", base, req.path());
    if let Some(query) =
        query_without_param(req.query_string(), config.protocol.artifact_parameter())
    {
        url.push('?');
        url.push_str(&query);
    }
    url
}

/// The login redirect target:
/// `login_url?service=<service>[&renew=true][&gateway=true]`.
pub fn construct_redirect_url(
    login_url: &str,
    service_param: &str,
    service_url: &str,
    renew: bool,
    gateway: bool,
    encode_service_url: bool,
) -> String {
    let separator = if login_url.contains('?') { '&' } else { '?' };
    let service_value = if encode_service_url {
        form_urlencoded::byte_serialize(service_url.as_bytes()).collect::<String>()
    } else {
        service_url.to_string()
    };

    let mut url = format!("{}{}{}={}", login_url, separator, service_param, service_value);
    if renew {
        url.push_str("&renew=true");
    }
    if gateway {
        url.push_str("&gateway=true");
    }
    url
}

/// The complete request URL including query string, as tested by the
/// exclusion matcher.
pub fn full_request_url(req: &ServiceRequest) -> String {
    let info = req.connection_info();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("{}://{}{}", info.scheme(), info.host(), path_and_query)
}

/// First value of a query parameter, percent-decoded.
pub fn query_param(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn query_without_param(query: &str, param: &str) -> Option<String> {
    if query.is_empty() {
        return None;
    }
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == param {
            continue;
        }
        serializer.append_pair(&key, &value);
        any = true;
    }
    if any {
        Some(serializer.finish())
    } else {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
