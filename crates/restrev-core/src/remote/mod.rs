//! Remote gateway for the restaurant REST backend.
//!
//! `execute` sends a stored request verbatim and is the only operation an
//! implementation has to provide; the typed calls are built on it so that a
//! queued request replays exactly as it was first attempted.

mod http;
mod request;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{NetworkError, Result};
use crate::models::{Restaurant, RestaurantId, Review};

pub use http::HttpGateway;
pub use request::{ApiRequest, EntityKind, Endpoints, HttpMethod};

/// Network access to the backend. Never touches the local store.
#[allow(async_fn_in_trait)]
pub trait RemoteGateway {
    /// Request builder bound to the configured base URL
    fn endpoints(&self) -> &Endpoints;

    /// Send `request` and return the parsed JSON response
    async fn execute(&self, request: &ApiRequest) -> std::result::Result<JsonValue, NetworkError>;

    /// Send `request` and decode the response into `T`
    async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let value = self.execute(request).await?;
        serde_json::from_value(value)
            .map_err(|error| NetworkError::Decode(error.to_string()).into())
    }

    async fn fetch_all<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<Vec<T>> {
        let request = self.endpoints().list(kind);
        self.send(&request).await
    }

    async fn fetch_one<T: DeserializeOwned>(&self, kind: EntityKind, id: i64) -> Result<T> {
        let request = self.endpoints().fetch_one(kind, id);
        self.send(&request).await
    }

    async fn fetch_reviews(&self, restaurant_id: RestaurantId) -> Result<Vec<Review>> {
        let request = self.endpoints().reviews_for(restaurant_id);
        self.send(&request).await
    }

    async fn create<T: DeserializeOwned>(&self, kind: EntityKind, payload: JsonValue) -> Result<T> {
        let request = self.endpoints().create(kind, payload);
        self.send(&request).await
    }

    async fn update<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        id: i64,
        payload: JsonValue,
    ) -> Result<T> {
        let request = self.endpoints().update(kind, id, payload);
        self.send(&request).await
    }

    async fn remove(&self, kind: EntityKind, id: i64) -> Result<JsonValue> {
        let request = self.endpoints().remove(kind, id);
        Ok(self.execute(&request).await?)
    }

    async fn set_favourite(&self, id: RestaurantId, is_favourite: bool) -> Result<Restaurant> {
        let request = self.endpoints().favourite(id, is_favourite);
        self.send(&request).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-process gateway

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::Value as JsonValue;

    use super::{ApiRequest, Endpoints, RemoteGateway};
    use crate::error::NetworkError;

    pub type Reply = std::result::Result<JsonValue, NetworkError>;

    /// Gateway that records every request and answers from a script
    ///
    /// With an empty script every call fails as unreachable.
    pub struct ScriptedGateway {
        endpoints: Endpoints,
        replies: Mutex<VecDeque<Reply>>,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedGateway {
        pub fn new() -> Self {
            Self {
                endpoints: Endpoints::new("http://api.test"),
                replies: Mutex::new(VecDeque::new()),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn offline() -> NetworkError {
            NetworkError::Unreachable("connection refused".to_string())
        }

        pub fn reply(&self, reply: Reply) -> &Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        pub fn ok(&self, value: JsonValue) -> &Self {
            self.reply(Ok(value))
        }

        pub fn fail(&self) -> &Self {
            self.reply(Err(Self::offline()))
        }

        pub fn sent(&self) -> Vec<ApiRequest> {
            self.sent.lock().unwrap().clone()
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl RemoteGateway for ScriptedGateway {
        fn endpoints(&self) -> &Endpoints {
            &self.endpoints
        }

        async fn execute(&self, request: &ApiRequest) -> Reply {
            self.sent.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Self::offline()))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::testing::ScriptedGateway;
    use super::*;
    use crate::error::Error;

    #[tokio::test(flavor = "multi_thread")]
    async fn typed_calls_decode_responses() {
        let gateway = ScriptedGateway::new();
        gateway.ok(json!([{ "id": "1", "name": "A", "is_favourite": "true" }]));

        let restaurants: Vec<Restaurant> = gateway.fetch_all(EntityKind::Restaurants).await.unwrap();
        assert_eq!(restaurants.len(), 1);
        assert_eq!(restaurants[0].id, 1);
        assert!(restaurants[0].is_favourite);
        assert_eq!(gateway.sent()[0].url, "http://api.test/restaurants");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unexpected_shape_is_a_decode_error() {
        let gateway = ScriptedGateway::new();
        gateway.ok(json!({ "error": "nope" }));

        let err = gateway.fetch_reviews(1).await.unwrap_err();
        match err {
            Error::Network(network) => assert!(!network.is_retryable()),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failures_propagate_as_network_errors() {
        let gateway = ScriptedGateway::new();
        let err = gateway.set_favourite(3, true).await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(
            gateway.sent()[0].url,
            "http://api.test/restaurants/3/?is_favourite=true"
        );
    }
}
