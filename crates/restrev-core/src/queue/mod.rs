//! Offline mutation queue
//!
//! Writes that fail for network reasons are recorded here as complete,
//! replayable requests and drained later by the sync reconciler in FIFO
//! order.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::remote::{ApiRequest, EntityKind, HttpMethod};
use crate::store::{LocalStore, StoreKey, Table};
use crate::util::unix_millis_now;

/// A mutation waiting to be replayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMutation {
    /// Store-assigned position in the queue; set when read back
    #[serde(skip)]
    pub queue_key: Option<StoreKey>,
    #[serde(flatten)]
    pub request: ApiRequest,
    /// Collection the server response reconciles into
    pub entity: EntityKind,
    /// Local store key of the review this mutation corresponds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_key: Option<StoreKey>,
    #[serde(default)]
    pub enqueued_at: i64,
}

impl QueuedMutation {
    pub fn new(request: ApiRequest, entity: EntityKind, correlation_key: Option<StoreKey>) -> Self {
        Self {
            queue_key: None,
            request,
            entity,
            correlation_key,
            enqueued_at: unix_millis_now(),
        }
    }

    fn decode(key: StoreKey, value: JsonValue) -> Result<Self> {
        let mut mutation: Self = serde_json::from_value(value)?;
        mutation.queue_key = Some(key);
        Ok(mutation)
    }

    fn concerns(&self, correlation_key: &StoreKey) -> bool {
        self.correlation_key.as_ref() == Some(correlation_key)
    }
}

/// Queue operations over a local store
pub struct OfflineQueue<'a, S> {
    store: &'a S,
    coalesce_edits: bool,
}

impl<'a, S: LocalStore> OfflineQueue<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self {
            store,
            coalesce_edits: true,
        }
    }

    /// Collapse repeated unsent edits of the same confirmed review
    #[must_use]
    pub const fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce_edits = enabled;
        self
    }

    /// Append one entry; returns its queue key
    pub async fn enqueue(
        &self,
        request: ApiRequest,
        entity: EntityKind,
        correlation_key: Option<StoreKey>,
    ) -> Result<StoreKey> {
        let mutation = QueuedMutation::new(request, entity, correlation_key);
        let key = self.store.put_typed(Table::OfflineQueue, &mutation).await?;
        tracing::info!(
            "Queued {} {} as entry {key}",
            mutation.request.method,
            mutation.request.url
        );
        Ok(key)
    }

    /// Record a failed write, folding it into an unsent edit of the same
    /// review when coalescing is enabled
    pub async fn record(
        &self,
        request: ApiRequest,
        entity: EntityKind,
        correlation_key: Option<StoreKey>,
    ) -> Result<StoreKey> {
        let foldable = matches!(request.method, HttpMethod::Put | HttpMethod::Delete);
        if self.coalesce_edits && foldable {
            if let Some(correlation) = &correlation_key {
                let previous = self
                    .find_by_correlation(correlation)
                    .await?
                    .into_iter()
                    .rev()
                    .find(|m| m.entity == entity && m.request.method == HttpMethod::Put);

                if let Some(previous) = previous {
                    let key = previous
                        .queue_key
                        .ok_or_else(|| Error::Database("queue entry without key".to_string()))?;
                    let replacement = QueuedMutation {
                        queue_key: None,
                        request,
                        entity,
                        correlation_key: correlation_key.clone(),
                        enqueued_at: previous.enqueued_at,
                    };
                    self.store
                        .put_at(Table::OfflineQueue, &key, &serde_json::to_value(&replacement)?)
                        .await?;
                    tracing::info!(
                        "Coalesced {} {} into queue entry {key}",
                        replacement.request.method,
                        replacement.request.url
                    );
                    return Ok(key);
                }
            }
        }

        self.enqueue(request, entity, correlation_key).await
    }

    /// Merge `fields` into the body of the pending create for a provisional
    /// review. Returns the entry's key, or `None` when no create is pending.
    pub async fn amend_pending_create(
        &self,
        correlation_key: &StoreKey,
        fields: &JsonValue,
    ) -> Result<Option<StoreKey>> {
        let mut cursor = self.store.iterate(Table::OfflineQueue);
        while let Some(entry) = cursor.next().await? {
            let key = entry.key.clone();
            let Ok(mut mutation) = QueuedMutation::decode(entry.key, entry.value) else {
                continue;
            };
            if !mutation.concerns(correlation_key) || mutation.request.method != HttpMethod::Post {
                continue;
            }

            if let (Some(JsonValue::Object(body)), JsonValue::Object(fields)) =
                (mutation.request.body.as_mut(), fields)
            {
                for (name, value) in fields {
                    body.insert(name.clone(), value.clone());
                }
            }
            cursor.update(&serde_json::to_value(&mutation)?).await?;
            tracing::debug!("Amended pending create {key} for review {correlation_key}");
            return Ok(Some(key));
        }
        Ok(None)
    }

    /// Drop every pending entry for `correlation_key`; returns how many
    pub async fn cancel_pending(&self, correlation_key: &StoreKey) -> Result<usize> {
        let mut cancelled = 0;
        let mut cursor = self.store.iterate(Table::OfflineQueue);
        while let Some(entry) = cursor.next().await? {
            let concerns = serde_json::from_value::<QueuedMutation>(entry.value)
                .is_ok_and(|mutation| mutation.concerns(correlation_key));
            if concerns {
                cursor.delete().await?;
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::info!("Cancelled {cancelled} queued mutation(s) for review {correlation_key}");
        }
        Ok(cancelled)
    }

    /// All readable entries in FIFO order
    pub async fn pending(&self) -> Result<Vec<QueuedMutation>> {
        let entries = self.store.get_all(Table::OfflineQueue).await?;
        let mut mutations = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = entry.key.clone();
            match QueuedMutation::decode(entry.key, entry.value) {
                Ok(mutation) => mutations.push(mutation),
                Err(error) => tracing::warn!("Skipping unreadable queue entry {key}: {error}"),
            }
        }
        Ok(mutations)
    }

    /// Entries for one review, in FIFO order
    pub async fn find_by_correlation(&self, correlation_key: &StoreKey) -> Result<Vec<QueuedMutation>> {
        Ok(self
            .pending()
            .await?
            .into_iter()
            .filter(|mutation| mutation.concerns(correlation_key))
            .collect())
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.store.get_all(Table::OfflineQueue).await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn remove(&self, queue_key: &StoreKey) -> Result<()> {
        self.store.delete(Table::OfflineQueue, queue_key).await
    }
}
