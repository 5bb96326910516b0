//! CAS assertion model.
//!
//! An [`Assertion`] is the verified identity produced by a successful
//! ticket validation: the authenticated principal, the attributes released
//! by the CAS server, and the validity window. It is immutable once
//! created, stored in request extensions for the current request and, when
//! session use is enabled, serialized into the session for reuse by later
//! requests.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Session attribute name under which the assertion is stored.
///
/// The name is a compatibility constant shared with other CAS clients so
/// that mixed deployments agree on where the assertion lives.
pub const CAS_ASSERTION_SESSION_KEY: &str = "_const_cas_assertion_";

/// Session attribute name for the single sign-out session index.
pub const CAS_SESSION_INDEX_KEY: &str = "_const_cas_session_index_";

/// The authenticated principal together with its released attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePrincipal {
    /// Principal identifier as reported by the CAS server.
    pub name: String,
    /// Attributes released by the server. Keys are unique; a key that
    /// appears multiple times in the validation response accumulates its
    /// values in order.
    pub attributes: HashMap<String, Vec<String>>,
    /// Proxy-granting ticket exchanged through the proxy callback, when
    /// proxying is configured and the IOU could be resolved.
    pub proxy_granting_ticket: Option<String>,
}

impl AttributePrincipal {
    pub fn new(name: impl Into<String>) -> Self {
        AttributePrincipal {
            name: name.into(),
            attributes: HashMap::new(),
            proxy_granting_ticket: None,
        }
    }

    /// First value of the named attribute, if released.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// A verified identity assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    principal: AttributePrincipal,
    valid_from_epoch_ms: u64,
    valid_until_epoch_ms: Option<u64>,
}

impl Assertion {
    /// Creates an assertion valid from now, with no expiry.
    pub fn new(principal: AttributePrincipal) -> Self {
        Assertion {
            principal,
            valid_from_epoch_ms: timestamp_millis(),
            valid_until_epoch_ms: None,
        }
    }

    /// Creates an assertion with an explicit validity window.
    pub fn with_validity(
        principal: AttributePrincipal,
        valid_from_epoch_ms: u64,
        valid_until_epoch_ms: Option<u64>,
    ) -> Self {
        Assertion {
            principal,
            valid_from_epoch_ms,
            valid_until_epoch_ms,
        }
    }

    pub fn principal(&self) -> &AttributePrincipal {
        &self.principal
    }

    pub fn valid_from_epoch_ms(&self) -> u64 {
        self.valid_from_epoch_ms
    }

    pub fn valid_until_epoch_ms(&self) -> Option<u64> {
        self.valid_until_epoch_ms
    }

    /// Whether the current time falls inside the validity window.
    pub fn is_valid(&self) -> bool {
        let now = timestamp_millis();
        now >= self.valid_from_epoch_ms
            && self.valid_until_epoch_ms.map_or(true, |until| now <= until)
    }
}

pub(crate) fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ============================================================================
// Tests
// ============================================================================
