//! Gateway (silent authentication) bookkeeping.
//!
//! In gateway mode the browser is sent to the CAS server with
//! `gateway=true`; the server redirects straight back without prompting
//! when no single sign-on session exists. A marker recorded before the
//! redirect is what stops the filter from redirecting the same request
//! again and looping forever.

use actix_session::SessionExt;
use actix_web::dev::ServiceRequest;
use tracing::warn;

/// Session attribute name holding the gateway marker.
pub const CAS_GATEWAY_SESSION_KEY: &str = "_const_cas_gateway_";

/// Records and checks gateway attempts for a service URL.
///
/// The marker's lifetime is bounded to one authentication round-trip:
/// checking a matching marker consumes it.
pub trait GatewayResolver: Send + Sync {
    /// Whether a gateway attempt was already made for this service URL.
    /// A matching marker is consumed by this call.
    fn has_gatewayed_already(&self, req: &ServiceRequest, service_url: &str) -> bool;

    /// Records a gateway attempt for this service URL. Returns the service
    /// URL to redirect with (implementations may rewrite it).
    fn store_gateway_information(&self, req: &ServiceRequest, service_url: &str) -> String;
}

/// Session-backed gateway storage keyed by service URL, optionally salted
/// with a configured token.
#[derive(Debug, Clone, Default)]
pub struct DefaultGatewayStorage {
    salt: Option<String>,
}

impl DefaultGatewayStorage {
    pub fn new(salt: Option<String>) -> Self {
        DefaultGatewayStorage { salt }
    }

    fn marker_for(&self, service_url: &str) -> String {
        match &self.salt {
            Some(salt) => format!("{}#{}", service_url, salt),
            None => service_url.to_string(),
        }
    }
}

impl GatewayResolver for DefaultGatewayStorage {
    fn has_gatewayed_already(&self, req: &ServiceRequest, service_url: &str) -> bool {
        let session = req.get_session();
        let stored = session
            .get::<String>(CAS_GATEWAY_SESSION_KEY)
            .unwrap_or_default();
        match stored {
            Some(marker) if marker == self.marker_for(service_url) => {
                session.remove(CAS_GATEWAY_SESSION_KEY);
                true
            }
            _ => false,
        }
    }

    fn store_gateway_information(&self, req: &ServiceRequest, service_url: &str) -> String {
        let session = req.get_session();
        if let Err(err) = session.insert(CAS_GATEWAY_SESSION_KEY, self.marker_for(service_url)) {
            warn!("failed to store gateway marker in session: {}", err);
        }
        service_url.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
