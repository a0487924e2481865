//! Offline queue replay.
//!
//! The reconciler replays queued requests verbatim in enqueue order and
//! folds the server's responses back into the local store, turning
//! provisional reviews into confirmed ones.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::config::DrainPolicy;
use crate::error::{Error, Result};
use crate::models::{Restaurant, Review};
use crate::queue::QueuedMutation;
use crate::remote::{EntityKind, HttpMethod, RemoteGateway};
use crate::store::{LocalStore, Table};

/// Outcome of one queue drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Entries the server accepted and that left the queue
    pub replayed: usize,
    /// Entries that failed and stay queued
    pub failed: usize,
    /// Entries still queued after the drain
    pub remaining: usize,
    /// The drain stopped early at a failure
    pub halted: bool,
}

impl DrainReport {
    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && self.remaining == 0
    }
}

/// Replays the offline queue through a gateway
pub struct Reconciler<'a, S, G> {
    store: &'a S,
    gateway: &'a G,
    policy: DrainPolicy,
}

impl<'a, S: LocalStore, G: RemoteGateway> Reconciler<'a, S, G> {
    pub const fn new(store: &'a S, gateway: &'a G) -> Self {
        Self {
            store,
            gateway,
            policy: DrainPolicy::StopOnFailure,
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: DrainPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replay every queued mutation in enqueue order
    pub async fn drain(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        let mut cursor = self.store.iterate(Table::OfflineQueue);

        while let Some(entry) = cursor.next().await? {
            let key = entry.key;
            let mutation: QueuedMutation = match serde_json::from_value(entry.value) {
                Ok(mutation) => mutation,
                Err(error) => {
                    tracing::warn!("Leaving unreadable queue entry {key} in place: {error}");
                    continue;
                }
            };

            match self.gateway.execute(&mutation.request).await {
                Ok(response) => {
                    cursor.delete().await?;
                    report.replayed += 1;
                    tracing::debug!(
                        "Replayed queue entry {key}: {} {}",
                        mutation.request.method,
                        mutation.request.url
                    );
                    if let Err(error) = self.reconcile(&mutation, response).await {
                        tracing::warn!("Failed to reconcile queue entry {key}: {error}");
                        self.drop_unconfirmed_create(&mutation).await;
                    }
                }
                Err(error) if !error.is_retryable() => {
                    // Accepted by the server; replaying again would duplicate it
                    cursor.delete().await?;
                    report.replayed += 1;
                    tracing::warn!("Queue entry {key} replayed but response was unusable: {error}");
                    self.drop_unconfirmed_create(&mutation).await;
                }
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(
                        "Replay of queue entry {key} ({} {}) failed: {error}",
                        mutation.request.method,
                        mutation.request.url
                    );
                    if self.policy == DrainPolicy::StopOnFailure {
                        report.halted = true;
                        break;
                    }
                }
            }
        }

        report.remaining = self.store.get_all(Table::OfflineQueue).await?.len();
        if report.replayed > 0 || report.failed > 0 {
            tracing::info!(
                "Queue drain finished: {} replayed, {} failed, {} remaining",
                report.replayed,
                report.failed,
                report.remaining
            );
        }
        Ok(report)
    }

    /// Forget the provisional review of a create the server accepted but
    /// whose answer could not be stored. Its queue entry is gone, so the
    /// server copy arrives with the next review cache-fill instead.
    async fn drop_unconfirmed_create(&self, mutation: &QueuedMutation) {
        let Some(key) = mutation.correlation_key.as_ref() else {
            return;
        };
        if mutation.entity != EntityKind::Reviews
            || mutation.request.method != HttpMethod::Post
            || !key.is_provisional()
        {
            return;
        }
        if let Err(error) = self.store.delete(Table::Reviews, key).await {
            tracing::warn!("Failed to drop provisional review {key}: {error}");
        }
    }

    /// Write the server's answer for `mutation` into the local store
    async fn reconcile(&self, mutation: &QueuedMutation, response: JsonValue) -> Result<()> {
        match (mutation.entity, mutation.request.method) {
            (EntityKind::Reviews, HttpMethod::Post | HttpMethod::Put) => {
                let review: Review = serde_json::from_value(response)?;
                if review.id.is_none() {
                    return Err(Error::Validation(
                        "server returned a review without an id".to_string(),
                    ));
                }
                let key = self.store.put_typed(Table::Reviews, &review).await?;
                if let Some(previous) = &mutation.correlation_key {
                    if *previous != key {
                        self.store.delete(Table::Reviews, previous).await?;
                    }
                }
            }
            (EntityKind::Reviews, HttpMethod::Delete) => {
                if let Some(key) = &mutation.correlation_key {
                    self.store.delete(Table::Reviews, key).await?;
                }
            }
            (EntityKind::Restaurants, HttpMethod::Put) => {
                let restaurant: Restaurant = serde_json::from_value(response)?;
                self.store.put_typed(Table::Restaurants, &restaurant).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::NetworkError;
    use crate::models::ReviewDraft;
    use crate::queue::OfflineQueue;
    use crate::remote::testing::ScriptedGateway;
    use crate::store::{LibSqlStore, StoreKey};

    async fn store() -> LibSqlStore {
        LibSqlStore::open_in_memory().await.unwrap()
    }

    async fn queue_favourites(store: &LibSqlStore, gateway: &ScriptedGateway, ids: &[i64]) {
        let queue = OfflineQueue::new(store);
        for id in ids {
            queue
                .enqueue(
                    gateway.endpoints().favourite(*id, true),
                    EntityKind::Restaurants,
                    None,
                )
                .await
                .unwrap();
        }
    }

    fn restaurant(id: i64) -> JsonValue {
        json!({ "id": id, "name": format!("R{id}"), "is_favourite": "true" })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replays_in_enqueue_order() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        queue_favourites(&store, &gateway, &[3, 1, 2]).await;
        gateway.ok(restaurant(3)).ok(restaurant(1)).ok(restaurant(2));

        let report = Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                replayed: 3,
                failed: 0,
                remaining: 0,
                halted: false
            }
        );
        let urls: Vec<String> = gateway.sent().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "http://api.test/restaurants/3/?is_favourite=true",
                "http://api.test/restaurants/1/?is_favourite=true",
                "http://api.test/restaurants/2/?is_favourite=true",
            ]
        );
        let cached: Restaurant = store
            .get_typed(Table::Restaurants, &StoreKey::Int(2))
            .await
            .unwrap()
            .unwrap();
        assert!(cached.is_favourite);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replay_removes_exactly_the_replayed_entry() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        queue_favourites(&store, &gateway, &[1]).await;
        let key = OfflineQueue::new(&store).pending().await.unwrap()[0]
            .queue_key
            .clone()
            .unwrap();
        gateway.ok(restaurant(1));

        Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert!(store.get(Table::OfflineQueue, &key).await.unwrap().is_none());
        assert_eq!(gateway.sent()[0], gateway.endpoints().favourite(1, true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_on_failure_halts_at_first_failure() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        queue_favourites(&store, &gateway, &[1, 2, 3]).await;
        gateway.ok(restaurant(1)).fail().ok(restaurant(3));

        let report = Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                replayed: 1,
                failed: 1,
                remaining: 2,
                halted: true
            }
        );
        assert_eq!(gateway.sent_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn best_effort_continues_past_failures() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        queue_favourites(&store, &gateway, &[1, 2, 3]).await;
        gateway.ok(restaurant(1)).fail().ok(restaurant(3));

        let report = Reconciler::new(&store, &gateway)
            .with_policy(DrainPolicy::BestEffort)
            .drain()
            .await
            .unwrap();

        assert_eq!(
            report,
            DrainReport {
                replayed: 2,
                failed: 1,
                remaining: 1,
                halted: false
            }
        );
        let left = OfflineQueue::new(&store).pending().await.unwrap();
        assert_eq!(left[0].request, gateway.endpoints().favourite(2, true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn provisional_review_becomes_confirmed() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        let draft = ReviewDraft::new(42, "Al", 5, "Great");
        let request = gateway
            .endpoints()
            .create(EntityKind::Reviews, draft.create_body());
        let provisional = store
            .put_typed(Table::Reviews, &draft.into_provisional(1))
            .await
            .unwrap();
        OfflineQueue::new(&store)
            .enqueue(request, EntityKind::Reviews, Some(provisional.clone()))
            .await
            .unwrap();

        gateway.ok(json!({
            "id": 999, "restaurant_id": "42", "name": "Al", "rating": "5", "comments": "Great"
        }));
        let report = Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert!(report.is_clean());
        assert!(store.get(Table::Reviews, &provisional).await.unwrap().is_none());
        let confirmed: Review = store
            .get_typed(Table::Reviews, &StoreKey::Int(999))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(confirmed.id, Some(999));
        assert_eq!(confirmed.restaurant_id, 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replayed_delete_removes_the_local_review() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        store
            .put(
                Table::Reviews,
                &json!({ "id": 7, "restaurant_id": 1, "name": "Al", "rating": 4, "comments": "x" }),
            )
            .await
            .unwrap();
        OfflineQueue::new(&store)
            .enqueue(
                gateway.endpoints().remove(EntityKind::Reviews, 7),
                EntityKind::Reviews,
                Some(StoreKey::Int(7)),
            )
            .await
            .unwrap();
        gateway.ok(json!({ "ok": true }));

        Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert!(store
            .get(Table::Reviews, &StoreKey::Int(7))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn undecodable_response_drops_the_entry() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        queue_favourites(&store, &gateway, &[1]).await;
        gateway.reply(Err(NetworkError::Decode("not json".to_string())));

        let report = Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert_eq!(report.replayed, 1);
        assert_eq!(report.remaining, 0);
    }

    /// Stores a provisional review and queues its create
    async fn queue_offline_review(store: &LibSqlStore, gateway: &ScriptedGateway) -> StoreKey {
        let draft = ReviewDraft::new(42, "Al", 5, "Great");
        let request = gateway
            .endpoints()
            .create(EntityKind::Reviews, draft.create_body());
        let provisional = store
            .put_typed(Table::Reviews, &draft.into_provisional(1))
            .await
            .unwrap();
        OfflineQueue::new(store)
            .enqueue(request, EntityKind::Reviews, Some(provisional.clone()))
            .await
            .unwrap();
        provisional
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn accepted_create_with_unreadable_answer_drops_provisional_review() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        let provisional = queue_offline_review(&store, &gateway).await;
        gateway.reply(Err(NetworkError::Decode("truncated".to_string())));

        let report = Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert_eq!(report.replayed, 1);
        assert_eq!(report.remaining, 0);
        assert!(store.get(Table::Reviews, &provisional).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn accepted_create_without_id_drops_provisional_review() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        let provisional = queue_offline_review(&store, &gateway).await;
        gateway.ok(json!({ "restaurant_id": 42, "name": "Al", "rating": 5, "comments": "Great" }));

        let report = Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert!(report.is_clean());
        assert!(store.get(Table::Reviews, &provisional).await.unwrap().is_none());
        assert!(store.get_all(Table::Reviews).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replayed_edit_keeps_confirmed_record() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        store
            .put(
                Table::Reviews,
                &json!({ "id": 7, "restaurant_id": 1, "name": "Al", "rating": 4, "comments": "old" }),
            )
            .await
            .unwrap();
        let update = crate::models::ReviewUpdate::new("Al", 2, "new");
        OfflineQueue::new(&store)
            .enqueue(
                gateway
                    .endpoints()
                    .update(EntityKind::Reviews, 7, update.update_body()),
                EntityKind::Reviews,
                Some(StoreKey::Int(7)),
            )
            .await
            .unwrap();
        gateway.ok(json!({ "id": 7, "restaurant_id": 1, "name": "Al", "rating": 2, "comments": "new" }));

        let report = Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert!(report.is_clean());
        let review: Review = store
            .get_typed(Table::Reviews, &StoreKey::Int(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(review.rating, 2);
        assert_eq!(review.comments, "new");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_entries_are_left_in_place() {
        let store = store().await;
        let gateway = ScriptedGateway::new();
        store
            .put(Table::OfflineQueue, &json!({ "garbage": true }))
            .await
            .unwrap();
        queue_favourites(&store, &gateway, &[1]).await;
        gateway.ok(restaurant(1));

        let report = Reconciler::new(&store, &gateway).drain().await.unwrap();

        assert_eq!(report.replayed, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(gateway.sent_count(), 1);
    }
}
