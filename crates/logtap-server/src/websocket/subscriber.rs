//! One live, authenticated, flow-scoped subscriber connection and its
//! authorization-filtered send protocol.
//!
//! Every record dispatched to a subscriber's flow passes through
//! [`Subscriber::send`], which decides per `(record, subscriber)` pair
//! whether the raw payload may be relayed or must be replaced by a
//! permission-denied payload. Writes funnel through a single-consumer
//! queue so frames from concurrent dispatch tasks never interleave;
//! the queue's sole consumer is the connection's writer task.

use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use logtap_auth::Identity;
use logtap_core::{FlowReference, Record};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::{
    BYTES_FILTERED_TOTAL, BYTES_TRANSFERRED_TOTAL, LOGS_FILTERED_TOTAL, LOGS_TRANSFERRED_TOTAL,
    SEND_QUEUE_DROPS_TOTAL,
};

use super::registry::SubscriberRegistry;

/// Per-subscriber delivery counters.
///
/// Mirrors the global metrics so tests and diagnostics can observe a
/// single connection without reading the Prometheus recorder.
#[derive(Debug, Default)]
pub struct SendStats {
    transferred: AtomicU64,
    transferred_bytes: AtomicU64,
    filtered: AtomicU64,
    filtered_bytes: AtomicU64,
    queue_drops: AtomicU64,
}

impl SendStats {
    /// Records relayed with their original payload.
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Bytes of original payload relayed.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Records withheld and replaced by a denial payload.
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    /// Bytes of original payload withheld.
    pub fn filtered_bytes(&self) -> u64 {
        self.filtered_bytes.load(Ordering::Relaxed)
    }

    /// Records dropped because the send queue was full.
    pub fn queue_drops(&self) -> u64 {
        self.queue_drops.load(Ordering::Relaxed)
    }
}

/// One authenticated, flow-scoped WebSocket subscriber.
///
/// Constructed only after successful authentication, flow parse, and
/// transport upgrade; registered immediately after construction and
/// never resurrected once unregistered.
pub struct Subscriber {
    id: Uuid,
    flow: FlowReference,
    identity: Identity,
    tx: mpsc::Sender<Bytes>,
    registry: Weak<SubscriberRegistry>,
    stats: SendStats,
}

impl Subscriber {
    /// Build a subscriber around a live connection's send queue.
    pub fn new(
        id: Uuid,
        flow: FlowReference,
        identity: Identity,
        tx: mpsc::Sender<Bytes>,
        registry: Weak<SubscriberRegistry>,
    ) -> Self {
        Self {
            id,
            flow,
            identity,
            tx,
            registry,
            stats: SendStats::default(),
        }
    }

    /// Connection identity. Two subscribers are "the same" only if
    /// their ids match.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The flow this subscriber is bound to.
    pub fn flow(&self) -> &FlowReference {
        &self.flow
    }

    /// The authenticated identity behind the connection.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Per-connection delivery counters.
    pub fn stats(&self) -> &SendStats {
        &self.stats
    }

    /// Deliver one record, applying the access-list policy.
    ///
    /// Returns promptly in all cases: payloads are enqueued on the
    /// connection's send queue, and teardown on a dead queue is
    /// scheduled asynchronously rather than awaited here.
    pub fn send(&self, record: &Record) {
        let Some(allow_list) = record.allow_list() else {
            // Deny-by-default: an untagged record is withheld from
            // this subscriber without touching either counter pair.
            debug!(
                subscriber = %self.id,
                flow = %self.flow,
                "access list missing from log record, withholding"
            );
            return;
        };

        let payload = if self.is_allowed(allow_list) {
            counter!(LOGS_TRANSFERRED_TOTAL).increment(1);
            counter!(BYTES_TRANSFERRED_TOTAL).increment(record.raw.len() as u64);
            let _ = self.stats.transferred.fetch_add(1, Ordering::Relaxed);
            let _ = self
                .stats
                .transferred_bytes
                .fetch_add(record.raw.len() as u64, Ordering::Relaxed);
            record.raw.clone()
        } else {
            // Byte counters always reflect the original payload, not
            // the substitute.
            counter!(LOGS_FILTERED_TOTAL).increment(1);
            counter!(BYTES_FILTERED_TOTAL).increment(record.raw.len() as u64);
            let _ = self.stats.filtered.fetch_add(1, Ordering::Relaxed);
            let _ = self
                .stats
                .filtered_bytes
                .fetch_add(record.raw.len() as u64, Ordering::Relaxed);
            denied_payload(
                record.pod_name().unwrap_or("unknown"),
                self.identity.username(),
            )
        };

        match self.tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                counter!(SEND_QUEUE_DROPS_TOTAL).increment(1);
                let _ = self.stats.queue_drops.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subscriber = %self.id,
                    flow = %self.flow,
                    "send queue full, dropping record"
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!(
                    subscriber = %self.id,
                    flow = %self.flow,
                    "send queue closed, scheduling unregistration"
                );
                self.schedule_unregister();
            }
        }
    }

    /// Membership test against a comma-separated access list.
    ///
    /// Both sides are normalized (colon → underscore) so structural
    /// separators in identity schemes cannot defeat the comparison.
    fn is_allowed(&self, allow_list: &str) -> bool {
        let me = self.identity.normalized_username();
        allow_list
            .split(',')
            .any(|candidate| candidate.replace(':', "_") == me)
    }

    /// Remove this subscriber from its registry on an independent
    /// task, never blocking the caller. Redundant calls are no-ops at
    /// the registry.
    pub(crate) fn schedule_unregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let flow = self.flow.clone();
            let id = self.id;
            let _ = tokio::spawn(async move {
                registry.unregister(&flow, id).await;
            });
        }
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscriber {}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("flow", &self.flow)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// The substitute payload written in place of a denied record.
fn denied_payload(pod_name: &str, username: &str) -> Bytes {
    let body = serde_json::json!({
        "error": format!("Permission denied to access {pod_name} logs for {username}"),
    });
    Bytes::from(body.to_string())
}
