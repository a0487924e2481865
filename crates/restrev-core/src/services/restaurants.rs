//! Restaurant and review service: cache-first reads, write-behind writes.

use std::collections::HashSet;

use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use super::WriteOutcome;
use crate::config::ClientConfig;
use crate::error::{Error, NetworkError, Result};
use crate::models::{
    unique_values, Restaurant, RestaurantId, Review, ReviewDraft, ReviewUpdate, ALL,
};
use crate::queue::{OfflineQueue, QueuedMutation};
use crate::remote::{EntityKind, RemoteGateway};
use crate::store::{Keyed, LocalStore, StoreKey, Table};
use crate::sync::{DrainReport, Reconciler};
use crate::util::unix_millis_now;

/// Read and write API consumed by the front-ends.
///
/// Local store failures never fail an operation on their own: reads fall
/// back to the network and writes only lose the ability to queue.
pub struct RestaurantService<S, G> {
    store: S,
    gateway: G,
    config: ClientConfig,
    drain_lock: Mutex<()>,
}

impl<S: LocalStore, G: RemoteGateway> RestaurantService<S, G> {
    pub fn new(store: S, gateway: G, config: ClientConfig) -> Self {
        Self {
            store,
            gateway,
            config,
            drain_lock: Mutex::new(()),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn queue(&self) -> OfflineQueue<'_, S> {
        OfflineQueue::new(&self.store).with_coalescing(self.config.coalesce_edits)
    }

    // Reads

    /// All restaurants from the server; the local cache is refreshed
    pub async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
        let restaurants: Vec<Restaurant> = self.gateway.fetch_all(EntityKind::Restaurants).await?;
        self.cache_restaurants(&restaurants).await;
        Ok(restaurants)
    }

    /// One restaurant, from the local cache when present
    pub async fn fetch_restaurant_by_id(&self, id: RestaurantId) -> Result<Restaurant> {
        match self
            .store
            .get_typed::<Restaurant>(Table::Restaurants, &StoreKey::Int(id))
            .await
        {
            Ok(Some(restaurant)) => return Ok(restaurant),
            Ok(None) => {}
            Err(error) => tracing::warn!("Local lookup of restaurant {id} failed: {error}"),
        }

        self.fetch_restaurants()
            .await?
            .into_iter()
            .find(|restaurant| restaurant.id == id)
            .ok_or_else(|| Error::NotFound(format!("no such restaurant {id}")))
    }

    pub async fn fetch_restaurants_by_cuisine(&self, cuisine: &str) -> Result<Vec<Restaurant>> {
        self.fetch_restaurants_by_cuisine_and_neighborhood(cuisine, ALL)
            .await
    }

    pub async fn fetch_restaurants_by_neighborhood(
        &self,
        neighborhood: &str,
    ) -> Result<Vec<Restaurant>> {
        self.fetch_restaurants_by_cuisine_and_neighborhood(ALL, neighborhood)
            .await
    }

    /// Equality filters on both dimensions; `"all"` disables one
    pub async fn fetch_restaurants_by_cuisine_and_neighborhood(
        &self,
        cuisine: &str,
        neighborhood: &str,
    ) -> Result<Vec<Restaurant>> {
        Ok(self
            .fetch_restaurants()
            .await?
            .into_iter()
            .filter(|restaurant| restaurant.matches(cuisine, neighborhood))
            .collect())
    }

    pub async fn fetch_neighborhoods(&self) -> Result<Vec<String>> {
        let restaurants = self.fetch_restaurants().await?;
        Ok(unique_values(&restaurants, |r| r.neighborhood.as_str()))
    }

    pub async fn fetch_cuisines(&self) -> Result<Vec<String>> {
        let restaurants = self.fetch_restaurants().await?;
        Ok(unique_values(&restaurants, |r| r.cuisine_type.as_str()))
    }

    /// Live reviews for a restaurant; empty when the server cannot be reached
    pub async fn fetch_restaurant_reviews(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<Review>> {
        match self.gateway.fetch_reviews(restaurant_id).await {
            Ok(reviews) => {
                if let Err(error) = self.cache_reviews(restaurant_id, &reviews).await {
                    tracing::warn!("Skipping review cache fill for restaurant {restaurant_id}: {error}");
                }
                Ok(reviews)
            }
            Err(error) => {
                tracing::warn!("Could not load reviews for restaurant {restaurant_id}: {error}");
                Ok(Vec::new())
            }
        }
    }

    /// Restaurants in the local cache
    pub async fn cached_restaurants(&self) -> Result<Vec<Restaurant>> {
        let entries = self.store.get_all(Table::Restaurants).await?;
        decode_values(entries)
    }

    /// Cached restaurants marked as favourite
    pub async fn favourites(&self) -> Result<Vec<Restaurant>> {
        let entries = self
            .store
            .get_all_by_index(Table::Restaurants, "is_favourite", &StoreKey::from("true"))
            .await?;
        decode_values(entries)
    }

    /// Cached reviews of a restaurant, provisional ones included
    pub async fn cached_reviews(&self, restaurant_id: RestaurantId) -> Result<Vec<Keyed<Review>>> {
        self.store
            .get_all_by_index(
                Table::Reviews,
                "restaurant_id",
                &StoreKey::Int(restaurant_id),
            )
            .await?
            .into_iter()
            .map(Keyed::decode)
            .collect()
    }

    /// One cached review by store key
    pub async fn cached_review(&self, key: &StoreKey) -> Result<Option<Review>> {
        self.store.get_typed(Table::Reviews, key).await
    }

    // Writes

    /// Post a review; queued as a provisional review when offline
    pub async fn create_review(&self, draft: ReviewDraft) -> Result<WriteOutcome<Keyed<Review>>> {
        let draft = draft.validated()?;
        let request = self
            .gateway
            .endpoints()
            .create(EntityKind::Reviews, draft.create_body());

        match self.gateway.send::<Review>(&request).await {
            Ok(review) => {
                let Some(id) = review.id else {
                    return Err(Error::Network(NetworkError::Decode(
                        "server returned a review without an id".to_string(),
                    )));
                };
                let key = StoreKey::Int(id);
                self.remember_review(&key, &review).await;
                Ok(WriteOutcome::Sent(Keyed::new(key, review)))
            }
            Err(Error::Network(cause)) if cause.is_retryable() => {
                let key = StoreKey::provisional();
                let queue_key = match self
                    .queue()
                    .enqueue(request, EntityKind::Reviews, Some(key.clone()))
                    .await
                {
                    Ok(queue_key) => queue_key,
                    Err(error) => return Err(cannot_defer(cause, &error)),
                };

                let review = draft.into_provisional(unix_millis_now());
                if let Err(error) = self.put_review(&key, &review).await {
                    tracing::warn!("Failed to store provisional review {key}: {error}");
                }
                Ok(WriteOutcome::Queued {
                    queue_key,
                    value: Keyed::new(key, review),
                    cause: Some(cause),
                })
            }
            Err(error) => Err(error),
        }
    }

    /// Edit a review by store key
    ///
    /// Provisional reviews are edited locally and the edit is folded into
    /// their pending create.
    pub async fn update_review(
        &self,
        key: &StoreKey,
        update: ReviewUpdate,
    ) -> Result<WriteOutcome<Keyed<Review>>> {
        let update = update.validated()?;
        match key {
            StoreKey::Int(id) => self.update_confirmed_review(*id, update).await,
            StoreKey::Text(_) => self.update_provisional_review(key, update).await,
        }
    }

    async fn update_confirmed_review(
        &self,
        id: i64,
        update: ReviewUpdate,
    ) -> Result<WriteOutcome<Keyed<Review>>> {
        let key = StoreKey::Int(id);
        let request =
            self.gateway
                .endpoints()
                .update(EntityKind::Reviews, id, update.update_body());

        match self.gateway.send::<Review>(&request).await {
            Ok(mut review) => {
                review.id.get_or_insert(id);
                self.remember_review(&key, &review).await;
                Ok(WriteOutcome::Sent(Keyed::new(key, review)))
            }
            Err(Error::Network(cause)) if cause.is_retryable() => {
                let mut review = match self.store.get_typed::<Review>(Table::Reviews, &key).await {
                    Ok(Some(review)) => review,
                    Ok(None) => {
                        let error = Error::NotFound(format!("no cached review {key}"));
                        return Err(cannot_defer(cause, &error));
                    }
                    Err(error) => return Err(cannot_defer(cause, &error)),
                };
                let queue_key = match self
                    .queue()
                    .record(request, EntityKind::Reviews, Some(key.clone()))
                    .await
                {
                    Ok(queue_key) => queue_key,
                    Err(error) => return Err(cannot_defer(cause, &error)),
                };

                review.apply(&update, unix_millis_now());
                if let Err(error) = self.put_review(&key, &review).await {
                    tracing::warn!("Failed to store offline edit of review {key}: {error}");
                }
                Ok(WriteOutcome::Queued {
                    queue_key,
                    value: Keyed::new(key, review),
                    cause: Some(cause),
                })
            }
            Err(error) => Err(error),
        }
    }

    async fn update_provisional_review(
        &self,
        key: &StoreKey,
        update: ReviewUpdate,
    ) -> Result<WriteOutcome<Keyed<Review>>> {
        let mut review: Review = self
            .store
            .get_typed(Table::Reviews, key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no such review {key}")))?;
        review.apply(&update, unix_millis_now());

        let queue = self.queue();
        let queue_key = match queue.amend_pending_create(key, &update.update_body()).await? {
            Some(queue_key) => queue_key,
            None => {
                let draft = ReviewDraft::new(
                    review.restaurant_id,
                    review.name.clone(),
                    review.rating,
                    review.comments.clone(),
                );
                let request = self
                    .gateway
                    .endpoints()
                    .create(EntityKind::Reviews, draft.create_body());
                queue
                    .enqueue(request, EntityKind::Reviews, Some(key.clone()))
                    .await?
            }
        };

        self.put_review(key, &review).await?;
        Ok(WriteOutcome::Queued {
            queue_key,
            value: Keyed::new(key.clone(), review),
            cause: None,
        })
    }

    /// Delete a review by store key
    ///
    /// A provisional review never reached the server, so deleting it only
    /// drops the local record and its pending create.
    pub async fn delete_review(&self, key: &StoreKey) -> Result<WriteOutcome<StoreKey>> {
        let StoreKey::Int(id) = key else {
            self.store.delete(Table::Reviews, key).await?;
            self.queue().cancel_pending(key).await?;
            return Ok(WriteOutcome::Local(key.clone()));
        };

        let request = self.gateway.endpoints().remove(EntityKind::Reviews, *id);
        match self.gateway.execute(&request).await {
            // The body of a delete confirmation is not needed
            Ok(_) | Err(NetworkError::Decode(_)) => {
                if let Err(error) = self.store.delete(Table::Reviews, key).await {
                    tracing::warn!("Failed to drop cached review {key}: {error}");
                }
                Ok(WriteOutcome::Sent(key.clone()))
            }
            Err(cause) => {
                let queue_key = match self
                    .queue()
                    .record(request, EntityKind::Reviews, Some(key.clone()))
                    .await
                {
                    Ok(queue_key) => queue_key,
                    Err(error) => return Err(cannot_defer(cause, &error)),
                };
                if let Err(error) = self.store.delete(Table::Reviews, key).await {
                    tracing::warn!("Failed to drop cached review {key}: {error}");
                }
                Ok(WriteOutcome::Queued {
                    queue_key,
                    value: key.clone(),
                    cause: Some(cause),
                })
            }
        }
    }

    /// Mark a restaurant as favourite
    pub async fn set_favourite(&self, id: RestaurantId) -> Result<WriteOutcome<Option<Restaurant>>> {
        self.toggle_favourite(id, true).await
    }

    /// Unmark a favourite restaurant
    pub async fn remove_favourite(
        &self,
        id: RestaurantId,
    ) -> Result<WriteOutcome<Option<Restaurant>>> {
        self.toggle_favourite(id, false).await
    }

    async fn toggle_favourite(
        &self,
        id: RestaurantId,
        is_favourite: bool,
    ) -> Result<WriteOutcome<Option<Restaurant>>> {
        let request = self.gateway.endpoints().favourite(id, is_favourite);
        match self.gateway.send::<Restaurant>(&request).await {
            Ok(restaurant) => {
                self.cache_restaurants(std::slice::from_ref(&restaurant))
                    .await;
                Ok(WriteOutcome::Sent(Some(restaurant)))
            }
            Err(Error::Network(cause)) if cause.is_retryable() => {
                let queue_key = match self
                    .queue()
                    .enqueue(request, EntityKind::Restaurants, None)
                    .await
                {
                    Ok(queue_key) => queue_key,
                    Err(error) => return Err(cannot_defer(cause, &error)),
                };
                let restaurant = self.mark_favourite_locally(id, is_favourite).await;
                Ok(WriteOutcome::Queued {
                    queue_key,
                    value: restaurant,
                    cause: Some(cause),
                })
            }
            Err(error) => Err(error),
        }
    }

    // Queue

    /// Mutations waiting for replay, in FIFO order
    pub async fn pending_mutations(&self) -> Result<Vec<QueuedMutation>> {
        self.queue().pending().await
    }

    /// Replay the offline queue; concurrent calls run one after another
    pub async fn sync(&self) -> Result<DrainReport> {
        let _guard = self.drain_lock.lock().await;
        let reconciler =
            Reconciler::new(&self.store, &self.gateway).with_policy(self.config.drain_policy);
        match reconciler.drain().await {
            Ok(report) => Ok(report),
            Err(error) if error.is_storage() => {
                tracing::warn!("Offline queue unavailable, nothing to sync: {error}");
                Ok(DrainReport::default())
            }
            Err(error) => Err(error),
        }
    }

    // Cache helpers

    async fn cache_restaurants(&self, restaurants: &[Restaurant]) {
        for restaurant in restaurants {
            if let Err(error) = self.store.put_typed(Table::Restaurants, restaurant).await {
                tracing::warn!("Skipping restaurant cache fill: {error}");
                return;
            }
        }
    }

    /// Upsert reviews the server returned and prune confirmed reviews it no
    /// longer has. Reviews with queued mutations keep their local state.
    async fn cache_reviews(&self, restaurant_id: RestaurantId, reviews: &[Review]) -> Result<()> {
        let pending: HashSet<StoreKey> = self
            .queue()
            .pending()
            .await?
            .into_iter()
            .filter(|mutation| mutation.entity == EntityKind::Reviews)
            .filter_map(|mutation| mutation.correlation_key)
            .collect();

        let mut live = HashSet::new();
        for review in reviews {
            let Some(id) = review.id else { continue };
            let key = StoreKey::Int(id);
            if !pending.contains(&key) {
                self.put_review(&key, review).await?;
            }
            live.insert(key);
        }

        let mut cursor =
            self.store
                .iterate_by_index(Table::Reviews, "restaurant_id", StoreKey::Int(restaurant_id));
        while let Some(entry) = cursor.next().await? {
            let confirmed = entry.key.as_int().is_some();
            if confirmed && !live.contains(&entry.key) && !pending.contains(&entry.key) {
                tracing::debug!("Pruning review {} removed on the server", entry.key);
                cursor.delete().await?;
            }
        }
        Ok(())
    }

    async fn put_review(&self, key: &StoreKey, review: &Review) -> Result<()> {
        self.store
            .put_at(Table::Reviews, key, &serde_json::to_value(review)?)
            .await
    }

    /// Cache a server-confirmed review under its server id
    async fn remember_review(&self, key: &StoreKey, review: &Review) {
        if let Err(error) = self.put_review(key, review).await {
            tracing::warn!("Failed to cache review {key}: {error}");
        }
    }

    async fn mark_favourite_locally(
        &self,
        id: RestaurantId,
        is_favourite: bool,
    ) -> Option<Restaurant> {
        let key = StoreKey::Int(id);
        let mut restaurant = match self
            .store
            .get_typed::<Restaurant>(Table::Restaurants, &key)
            .await
        {
            Ok(restaurant) => restaurant?,
            Err(error) => {
                tracing::warn!("Local lookup of restaurant {id} failed: {error}");
                return None;
            }
        };
        restaurant.is_favourite = is_favourite;
        if let Err(error) = self.store.put_typed(Table::Restaurants, &restaurant).await {
            tracing::warn!("Failed to store favourite flag for restaurant {id}: {error}");
        }
        Some(restaurant)
    }
}

fn decode_values<T: serde::de::DeserializeOwned>(entries: Vec<Keyed<JsonValue>>) -> Result<Vec<T>> {
    entries
        .into_iter()
        .map(|entry| entry.decode().map(|keyed| keyed.value))
        .collect()
}

/// A deferrable write that could not be queued fails with its network error
fn cannot_defer(cause: NetworkError, error: &Error) -> Error {
    tracing::warn!("Cannot queue write for later replay: {error}");
    Error::Network(cause)
}
