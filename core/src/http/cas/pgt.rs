//! Proxy-granting ticket storage and background expiry.
//!
//! During ticket validation the CAS server delivers a proxy-granting
//! ticket out of band: it calls the configured callback URL with an IOU
//! identifier and the ticket value, and the validation response carries
//! only the IOU. The store correlates the two. Entries are short-lived;
//! a periodic cleanup task evicts anything older than the retention
//! window.
//!
//! All operations are single-entry and guarded by one lock, so request
//! threads, the proxy callback and the cleanup task can run concurrently
//! without further coordination.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::http::cas::cipher::CasCipher;
use crate::http::error::CasError;

/// Mapping from proxy-granting ticket IOUs to ticket values.
pub trait ProxyGrantingTicketStorage: Send + Sync {
    /// Records a mapping, overwriting any prior value for the same IOU.
    fn save(&self, pgt_iou: &str, pgt: &str) -> Result<(), CasError>;

    /// Returns the ticket for an IOU. Not single-use: concurrent retrievals
    /// of the same key are safe and consistent.
    fn retrieve(&self, pgt_iou: &str) -> Option<String>;

    /// One bounded scan-and-evict pass over the entries.
    fn cleanup(&self);
}

struct PgtEntry {
    value: String,
    created: Instant,
}

/// In-memory store: one map, one lock.
pub struct InMemoryProxyGrantingTicketStorage {
    entries: RwLock<HashMap<String, PgtEntry>>,
    retention: Duration,
}

impl Default for InMemoryProxyGrantingTicketStorage {
    fn default() -> Self {
        Self::with_retention(Duration::from_secs(60))
    }
}

impl InMemoryProxyGrantingTicketStorage {
    pub fn with_retention(retention: Duration) -> Self {
        InMemoryProxyGrantingTicketStorage {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }
}

impl ProxyGrantingTicketStorage for InMemoryProxyGrantingTicketStorage {
    fn save(&self, pgt_iou: &str, pgt: &str) -> Result<(), CasError> {
        debug!("storing proxy-granting ticket for IOU {}", pgt_iou);
        self.entries.write().unwrap().insert(
            pgt_iou.to_string(),
            PgtEntry {
                value: pgt.to_string(),
                created: Instant::now(),
            },
        );
        Ok(())
    }

    fn retrieve(&self, pgt_iou: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap()
            .get(pgt_iou)
            .map(|entry| entry.value.clone())
    }

    fn cleanup(&self) {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.created.elapsed() <= self.retention);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("evicted {} expired proxy-granting ticket(s)", evicted);
        }
    }
}

/// Store that encrypts ticket values at rest with a configured symmetric
/// cipher. A decryption failure on retrieve is logged and reported as
/// not-found.
pub struct EncryptedProxyGrantingTicketStorage {
    inner: InMemoryProxyGrantingTicketStorage,
    cipher: CasCipher,
}

impl EncryptedProxyGrantingTicketStorage {
    pub fn new(cipher: CasCipher, retention: Duration) -> Self {
        EncryptedProxyGrantingTicketStorage {
            inner: InMemoryProxyGrantingTicketStorage::with_retention(retention),
            cipher,
        }
    }
}

impl ProxyGrantingTicketStorage for EncryptedProxyGrantingTicketStorage {
    fn save(&self, pgt_iou: &str, pgt: &str) -> Result<(), CasError> {
        let encrypted = self.cipher.encrypt(pgt)?;
        self.inner.save(pgt_iou, &encrypted)
    }

    fn retrieve(&self, pgt_iou: &str) -> Option<String> {
        let encrypted = self.inner.retrieve(pgt_iou)?;
        match self.cipher.decrypt(&encrypted) {
            Ok(pgt) => Some(pgt),
            Err(err) => {
                error!(
                    "failed to decrypt proxy-granting ticket for IOU {}: {}",
                    pgt_iou, err
                );
                None
            }
        }
    }

    fn cleanup(&self) {
        self.inner.cleanup()
    }
}

/// Cancellable periodic eviction task.
///
/// Started once at initialization; stopping (or dropping) the scheduler
/// ends the task without leaking it.
pub struct CleanupScheduler {
    stop: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl CleanupScheduler {
    /// Spawns the cleanup task with the given period. Must be called from
    /// within an async runtime.
    pub fn start(storage: Arc<dyn ProxyGrantingTicketStorage>, period: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    _ = interval.tick() => storage.cleanup(),
                    _ = &mut stop_rx => break,
                }
            }
            debug!("proxy-granting ticket cleanup task stopped");
        });
        CleanupScheduler {
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Stops the task. Dropping the scheduler has the same effect.
    pub fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        // Dropping the stop sender wakes the task and ends its loop.
        self.stop.take();
    }
}

// ============================================================================
// Tests
// ============================================================================
