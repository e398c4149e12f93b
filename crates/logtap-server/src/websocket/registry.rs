//! Concurrency-safe mapping from flow identity to live subscribers.
//!
//! The registry is shared by every admission task and by the dispatch
//! path. Buckets are keyed by connection id, so register, unregister,
//! and snapshot tolerate arbitrary interleavings; iteration never
//! escapes the lock scope except through owned snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use logtap_core::{FlowReference, Record};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::subscriber::Subscriber;

/// Maps each flow to the set of currently live subscribers.
pub struct SubscriberRegistry {
    flows: RwLock<HashMap<FlowReference, HashMap<Uuid, Arc<Subscriber>>>>,
    /// Atomic total across all flows (avoids read-locking for count queries).
    active_count: AtomicUsize,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            flows: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a subscriber to its flow's bucket.
    pub async fn register(&self, subscriber: Arc<Subscriber>) {
        let flow = subscriber.flow().clone();
        let id = subscriber.id();
        let mut flows = self.flows.write().await;
        if flows
            .entry(flow.clone())
            .or_default()
            .insert(id, subscriber)
            .is_none()
        {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
        debug!(subscriber = %id, %flow, "subscriber registered");
    }

    /// Remove a subscriber by connection id.
    ///
    /// Absent entries are a no-op, so peer-initiated close and
    /// write-error teardown may race here freely.
    pub async fn unregister(&self, flow: &FlowReference, id: Uuid) {
        let mut flows = self.flows.write().await;
        if let Some(bucket) = flows.get_mut(flow) {
            if bucket.remove(&id).is_some() {
                let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                debug!(subscriber = %id, %flow, "subscriber unregistered");
            }
            if bucket.is_empty() {
                let _ = flows.remove(flow);
            }
        }
    }

    /// Snapshot of the live subscriber set for a flow at call time.
    pub async fn subscribers_for(&self, flow: &FlowReference) -> Vec<Arc<Subscriber>> {
        let flows = self.flows.read().await;
        flows
            .get(flow)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Deliver one record to every subscriber currently registered
    /// for `flow`. Pipeline boundary: callers serialize dispatch per
    /// flow if they need per-subscriber ordering.
    pub async fn dispatch(&self, flow: &FlowReference, record: &Record) {
        for subscriber in self.subscribers_for(flow).await {
            subscriber.send(record);
        }
    }

    /// Total registered subscribers across all flows.
    pub fn subscriber_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use logtap_auth::Identity;
    use logtap_core::ALLOW_LIST_LABEL;
    use serde_json::json;
    use std::sync::Weak;
    use tokio::sync::mpsc;

    fn make_subscriber(
        flow: FlowReference,
        username: &str,
        registry: Weak<SubscriberRegistry>,
    ) -> (Arc<Subscriber>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(32);
        let subscriber = Arc::new(Subscriber::new(
            Uuid::now_v7(),
            flow,
            Identity::new(username),
            tx,
            registry,
        ));
        (subscriber, rx)
    }

    fn open_record(raw: &str) -> Record {
        // Allow list admits everyone used in these tests.
        Record::new(
            json!({
                "kubernetes": {
                    "pod_name": "pod-0",
                    "labels": { ALLOW_LIST_LABEL: "alice,bob,carol" },
                },
            }),
            raw.as_bytes().to_vec(),
        )
    }

    #[tokio::test]
    async fn register_and_snapshot() {
        let registry = Arc::new(SubscriberRegistry::new());
        let flow = FlowReference::flow("ns", "app");
        let (subscriber, _rx) = make_subscriber(flow.clone(), "alice", Weak::new());

        registry.register(subscriber.clone()).await;

        let snapshot = registry.subscribers_for(&flow).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), subscriber.id());
        assert_eq!(registry.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn subscribers_scoped_to_their_own_flow() {
        let registry = Arc::new(SubscriberRegistry::new());
        let flow_a = FlowReference::flow("ns", "a");
        let flow_b = FlowReference::cluster_flow("b");
        let (sub_a, mut rx_a) = make_subscriber(flow_a.clone(), "alice", Weak::new());
        let (sub_b, mut rx_b) = make_subscriber(flow_b.clone(), "bob", Weak::new());
        registry.register(sub_a).await;
        registry.register(sub_b).await;

        registry.dispatch(&flow_a, &open_record("for-a")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_sends_exactly_once_per_subscriber() {
        let registry = Arc::new(SubscriberRegistry::new());
        let flow = FlowReference::flow("ns", "app");
        let (s1, mut rx1) = make_subscriber(flow.clone(), "alice", Weak::new());
        let (s2, mut rx2) = make_subscriber(flow.clone(), "bob", Weak::new());
        registry.register(s1).await;
        registry.register(s2).await;

        registry.dispatch(&flow, &open_record("one")).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_to_empty_flow_is_a_noop() {
        let registry = SubscriberRegistry::new();
        registry
            .dispatch(&FlowReference::cluster_flow("nobody"), &open_record("x"))
            .await;
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unregister_removes_subscriber() {
        let registry = Arc::new(SubscriberRegistry::new());
        let flow = FlowReference::flow("ns", "app");
        let (subscriber, _rx) = make_subscriber(flow.clone(), "alice", Weak::new());
        let id = subscriber.id();
        registry.register(subscriber).await;

        registry.unregister(&flow, id).await;

        assert!(registry.subscribers_for(&flow).await.is_empty());
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unregister_twice_is_safe() {
        let registry = Arc::new(SubscriberRegistry::new());
        let flow = FlowReference::flow("ns", "app");
        let (subscriber, _rx) = make_subscriber(flow.clone(), "alice", Weak::new());
        let id = subscriber.id();
        registry.register(subscriber).await;

        registry.unregister(&flow, id).await;
        registry.unregister(&flow, id).await;

        assert!(registry.subscribers_for(&flow).await.is_empty());
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unregister_unknown_id_is_a_noop() {
        let registry = SubscriberRegistry::new();
        registry
            .unregister(&FlowReference::flow("ns", "app"), Uuid::now_v7())
            .await;
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unregister_leaves_other_subscribers_in_flow() {
        let registry = Arc::new(SubscriberRegistry::new());
        let flow = FlowReference::flow("ns", "app");
        let (s1, _rx1) = make_subscriber(flow.clone(), "alice", Weak::new());
        let (s2, _rx2) = make_subscriber(flow.clone(), "bob", Weak::new());
        let id1 = s1.id();
        registry.register(s1).await;
        registry.register(s2.clone()).await;

        registry.unregister(&flow, id1).await;

        let snapshot = registry.subscribers_for(&flow).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), s2.id());
    }

    #[tokio::test]
    async fn snapshot_is_point_in_time() {
        let registry = Arc::new(SubscriberRegistry::new());
        let flow = FlowReference::flow("ns", "app");
        let (s1, _rx1) = make_subscriber(flow.clone(), "alice", Weak::new());
        registry.register(s1).await;

        let snapshot = registry.subscribers_for(&flow).await;

        let (s2, _rx2) = make_subscriber(flow.clone(), "bob", Weak::new());
        registry.register(s2).await;
        // The earlier snapshot does not grow.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.subscribers_for(&flow).await.len(), 2);
    }

    #[tokio::test]
    async fn closed_queue_send_triggers_async_unregistration() {
        let registry = Arc::new(SubscriberRegistry::new());
        let flow = FlowReference::flow("ns", "app");
        let (subscriber, rx) =
            make_subscriber(flow.clone(), "alice", Arc::downgrade(&registry));
        registry.register(subscriber.clone()).await;
        drop(rx); // simulate the writer task dying

        subscriber.send(&open_record("payload"));

        // Unregistration runs on its own task; poll for completion.
        for _ in 0..100 {
            if registry.subscriber_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(registry.subscriber_count(), 0);
        assert!(registry.subscribers_for(&flow).await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_register_unregister() {
        let registry = Arc::new(SubscriberRegistry::new());
        let flow = FlowReference::cluster_flow("busy");

        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            let flow = flow.clone();
            handles.push(tokio::spawn(async move {
                let (subscriber, _rx) = {
                    let (tx, rx) = mpsc::channel(1);
                    (
                        Arc::new(Subscriber::new(
                            Uuid::now_v7(),
                            flow.clone(),
                            Identity::new("alice"),
                            tx,
                            Weak::new(),
                        )),
                        rx,
                    )
                };
                let id = subscriber.id();
                registry.register(subscriber).await;
                registry.unregister(&flow, id).await;
                // Redundant unregister must stay a no-op under races.
                registry.unregister(&flow, id).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.subscriber_count(), 0);
        assert!(registry.subscribers_for(&flow).await.is_empty());
    }
}
