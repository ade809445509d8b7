//! Import progress fanout registry.
//!
//! A process-local registry mapping batches to subscribers. The ingestion
//! pipeline publishes progress, status changes, and errors; an external
//! transport (WebSocket) drains each subscriber's channel and delivers the
//! serialized messages. The latest payload of each kind is mirrored to the
//! cache so late subscribers can fetch the last snapshot, and cancellation is
//! signalled through a dedicated cache key polled by the pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::cache::Cache;
use crate::error::ReconResult;
use crate::streaming::{BoundedChannel, OverflowStrategy};

/// TTL for cached progress snapshots.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(3600);

/// Buffered messages per subscriber before the oldest is evicted.
const SUBSCRIBER_BUFFER: usize = 64;

/// Kind of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMessageKind {
    ImportProgress,
    ImportStatusChange,
    ImportError,
    ConnectionEstablished,
    SubscriptionConfirmed,
    Pong,
}

/// A structured message delivered to progress subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressMessage {
    /// Message kind
    #[serde(rename = "type")]
    pub kind: ProgressMessageKind,

    /// Batch the message concerns, if any
    pub batch_id: Option<Uuid>,

    /// Message payload
    pub data: Option<serde_json::Value>,

    /// ISO-8601 emission timestamp
    pub timestamp: String,
}

impl ProgressMessage {
    fn new(kind: ProgressMessageKind, batch_id: Uuid, data: Option<serde_json::Value>) -> Self {
        Self {
            kind,
            batch_id: Some(batch_id),
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Receiving side handed to the transport for one subscriber.
pub type ProgressReceiver = BoundedChannel<ProgressMessage>;

#[derive(Default)]
struct Registry {
    /// batch -> subscriber id -> channel
    by_batch: HashMap<Uuid, HashMap<String, BoundedChannel<ProgressMessage>>>,
    /// (tenant, subscriber id) -> batches
    by_subscriber: HashMap<(Uuid, String), HashSet<Uuid>>,
}

/// Process-local progress fanout. All methods are safe for concurrent callers.
pub struct ProgressFanout {
    cache: Arc<dyn Cache>,
    registry: Mutex<Registry>,
}

impl ProgressFanout {
    /// Create a fanout backed by the given cache.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Cache key holding the latest progress snapshot for a batch.
    pub fn progress_key(batch_id: Uuid) -> String {
        format!("import_progress:{}", batch_id)
    }

    /// Cache key holding the latest status snapshot for a batch.
    pub fn status_key(batch_id: Uuid) -> String {
        format!("import_status:{}", batch_id)
    }

    /// Cache key carrying the cancellation flag for a batch.
    pub fn cancel_key(batch_id: Uuid) -> String {
        format!("cancel_import:{}", batch_id)
    }

    /// Subscribe to a batch's messages. Returns the subscriber's channel;
    /// subscribing the same id again replaces the previous channel.
    pub fn subscribe(
        &self,
        tenant_id: Uuid,
        subscriber_id: &str,
        batch_id: Uuid,
    ) -> ProgressReceiver {
        let channel = BoundedChannel::new(SUBSCRIBER_BUFFER, OverflowStrategy::DropOldest);
        let mut registry = self.registry.lock().unwrap();
        registry
            .by_batch
            .entry(batch_id)
            .or_default()
            .insert(subscriber_id.to_string(), channel.clone());
        registry
            .by_subscriber
            .entry((tenant_id, subscriber_id.to_string()))
            .or_default()
            .insert(batch_id);
        debug!(%batch_id, subscriber = subscriber_id, "progress subscription added");

        let _ = channel.send(ProgressMessage::new(
            ProgressMessageKind::SubscriptionConfirmed,
            batch_id,
            None,
        ));
        channel
    }

    /// Remove one subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, tenant_id: Uuid, subscriber_id: &str, batch_id: Uuid) {
        let mut registry = self.registry.lock().unwrap();
        if let Some(subscribers) = registry.by_batch.get_mut(&batch_id) {
            if let Some(channel) = subscribers.remove(subscriber_id) {
                channel.close();
            }
            if subscribers.is_empty() {
                registry.by_batch.remove(&batch_id);
            }
        }
        let key = (tenant_id, subscriber_id.to_string());
        if let Some(batches) = registry.by_subscriber.get_mut(&key) {
            batches.remove(&batch_id);
            if batches.is_empty() {
                registry.by_subscriber.remove(&key);
            }
        }
    }

    /// Drop every subscription a subscriber holds (connection closed).
    pub fn unsubscribe_all(&self, tenant_id: Uuid, subscriber_id: &str) {
        let mut registry = self.registry.lock().unwrap();
        let key = (tenant_id, subscriber_id.to_string());
        if let Some(batches) = registry.by_subscriber.remove(&key) {
            for batch_id in batches {
                if let Some(subscribers) = registry.by_batch.get_mut(&batch_id) {
                    if let Some(channel) = subscribers.remove(subscriber_id) {
                        channel.close();
                    }
                    if subscribers.is_empty() {
                        registry.by_batch.remove(&batch_id);
                    }
                }
            }
        }
    }

    /// Publish a progress payload to all subscribers and snapshot it.
    pub fn publish_progress(
        &self,
        batch_id: Uuid,
        payload: serde_json::Value,
    ) -> ReconResult<()> {
        self.cache
            .set(&Self::progress_key(batch_id), payload.clone(), SNAPSHOT_TTL)?;
        self.deliver(
            batch_id,
            ProgressMessage::new(ProgressMessageKind::ImportProgress, batch_id, Some(payload)),
        );
        Ok(())
    }

    /// Publish a status change and snapshot it.
    pub fn publish_status(
        &self,
        batch_id: Uuid,
        tenant_id: Uuid,
        status: &str,
        payload: Option<serde_json::Value>,
    ) -> ReconResult<()> {
        let mut data = serde_json::Map::new();
        data.insert("status".to_string(), serde_json::json!(status));
        data.insert("tenant_id".to_string(), serde_json::json!(tenant_id));
        if let Some(extra) = payload {
            data.insert("details".to_string(), extra);
        }
        let data = serde_json::Value::Object(data);

        self.cache
            .set(&Self::status_key(batch_id), data.clone(), SNAPSHOT_TTL)?;
        self.deliver(
            batch_id,
            ProgressMessage::new(
                ProgressMessageKind::ImportStatusChange,
                batch_id,
                Some(data),
            ),
        );
        Ok(())
    }

    /// Publish an error notification.
    pub fn publish_error(
        &self,
        batch_id: Uuid,
        tenant_id: Uuid,
        error: serde_json::Value,
    ) -> ReconResult<()> {
        let data = serde_json::json!({"tenant_id": tenant_id, "error": error});
        self.deliver(
            batch_id,
            ProgressMessage::new(ProgressMessageKind::ImportError, batch_id, Some(data)),
        );
        Ok(())
    }

    /// Latest cached progress snapshot for late subscribers.
    pub fn cached_progress(&self, batch_id: Uuid) -> ReconResult<Option<serde_json::Value>> {
        self.cache.get(&Self::progress_key(batch_id))
    }

    /// Request cancellation of a running import.
    pub fn request_cancel(&self, batch_id: Uuid) -> ReconResult<()> {
        self.cache.set(
            &Self::cancel_key(batch_id),
            serde_json::json!("true"),
            SNAPSHOT_TTL,
        )
    }

    /// Whether cancellation has been requested for a batch. Polled by the
    /// ingestion pipeline at every progress checkpoint.
    pub fn is_cancel_requested(&self, batch_id: Uuid) -> bool {
        matches!(
            self.cache.get(&Self::cancel_key(batch_id)),
            Ok(Some(serde_json::Value::String(flag))) if flag == "true"
        )
    }

    /// Clear batch-scoped cache keys once a batch reaches a terminal state.
    pub fn cleanup(&self, batch_id: Uuid) -> ReconResult<()> {
        self.cache.delete(&Self::progress_key(batch_id))?;
        self.cache.delete(&Self::status_key(batch_id))?;
        self.cache.delete(&Self::cancel_key(batch_id))
    }

    fn deliver(&self, batch_id: Uuid, message: ProgressMessage) {
        let registry = self.registry.lock().unwrap();
        if let Some(subscribers) = registry.by_batch.get(&batch_id) {
            for channel in subscribers.values() {
                // Closed channels belong to departed subscribers; ignore.
                let _ = channel.send(message.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[test]
    fn test_subscribe_and_publish() {
        let fanout = ProgressFanout::new(Arc::new(MemoryCache::new()));
        let tenant = Uuid::new_v4();
        let batch = Uuid::new_v4();

        let rx = fanout.subscribe(tenant, "conn-1", batch);
        // First message confirms the subscription.
        let confirm = rx.try_recv().unwrap();
        assert_eq!(confirm.kind, ProgressMessageKind::SubscriptionConfirmed);

        fanout
            .publish_progress(batch, serde_json::json!({"progress_percentage": 40}))
            .unwrap();

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.kind, ProgressMessageKind::ImportProgress);
        assert_eq!(msg.batch_id, Some(batch));

        // Snapshot is retrievable for late subscribers.
        let snapshot = fanout.cached_progress(batch).unwrap().unwrap();
        assert_eq!(snapshot["progress_percentage"], 40);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let fanout = ProgressFanout::new(Arc::new(MemoryCache::new()));
        let tenant = Uuid::new_v4();
        let batch = Uuid::new_v4();

        let rx = fanout.subscribe(tenant, "conn-1", batch);
        fanout.unsubscribe(tenant, "conn-1", batch);

        fanout
            .publish_progress(batch, serde_json::json!({"progress_percentage": 10}))
            .unwrap();

        // Confirmation was buffered before unsubscribe; nothing after it.
        let confirm = rx.try_recv().unwrap();
        assert_eq!(confirm.kind, ProgressMessageKind::SubscriptionConfirmed);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_cancellation_flag_roundtrip() {
        let fanout = ProgressFanout::new(Arc::new(MemoryCache::new()));
        let batch = Uuid::new_v4();

        assert!(!fanout.is_cancel_requested(batch));
        fanout.request_cancel(batch).unwrap();
        assert!(fanout.is_cancel_requested(batch));

        fanout.cleanup(batch).unwrap();
        assert!(!fanout.is_cancel_requested(batch));
    }
}
