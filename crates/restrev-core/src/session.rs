//! Per-session state of a front-end.

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{Restaurant, RestaurantId};
use crate::remote::RemoteGateway;
use crate::services::RestaurantService;
use crate::store::LocalStore;

/// State owned by one browsing session, passed explicitly to the calls
/// that need it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Option<Restaurant>,
}

impl Session {
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Restaurant currently being viewed
    pub const fn current(&self) -> Option<&Restaurant> {
        self.current.as_ref()
    }

    pub fn set_current(&mut self, restaurant: Restaurant) {
        self.current = Some(restaurant);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Resolve the restaurant named by the `id` query parameter of a page
    /// URL. Once resolved, the session keeps returning the same restaurant.
    pub async fn restaurant_from_url<S, G>(
        &mut self,
        service: &RestaurantService<S, G>,
        url: &str,
    ) -> Result<&Restaurant>
    where
        S: LocalStore,
        G: RemoteGateway,
    {
        if self.current.is_none() {
            let id = query_param(url, "id")
                .filter(|id| !id.is_empty())
                .ok_or_else(|| Error::Validation("No restaurant id in URL".to_string()))?;
            let id: RestaurantId = id
                .trim()
                .parse()
                .map_err(|_| Error::Validation(format!("invalid restaurant id '{id}'")))?;

            self.current = Some(service.fetch_restaurant_by_id(id).await?);
        }

        self.current
            .as_ref()
            .ok_or_else(|| Error::NotFound("no current restaurant".to_string()))
    }
}

/// Value of query parameter `name` in `url`
///
/// `Some("")` when the parameter is present without a value; `+` decodes
/// to a space.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let pattern = format!(r"[?&]{}(=([^&#]*)|&|#|$)", regex::escape(name));
    let regex = Regex::new(&pattern).ok()?;
    let captures = regex.captures(url)?;

    let Some(raw) = captures.get(2) else {
        return Some(String::new());
    };
    let raw = raw.as_str().replace('+', " ");
    Some(
        urlencoding::decode(&raw)
            .map_or_else(|_| raw.clone(), std::borrow::Cow::into_owned),
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::remote::testing::ScriptedGateway;
    use crate::store::LibSqlStore;

    #[test]
    fn reads_query_parameters() {
        let url = "http://localhost:8000/restaurant.html?id=3&name=Kang+Ho%20Dong&flag#map";
        assert_eq!(query_param(url, "id").as_deref(), Some("3"));
        assert_eq!(query_param(url, "name").as_deref(), Some("Kang Ho Dong"));
        assert_eq!(query_param(url, "flag").as_deref(), Some(""));
        assert_eq!(query_param(url, "missing"), None);
        assert_eq!(query_param("./restaurant.html?xid=4", "id"), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolves_restaurant_once_per_session() {
        let store = LibSqlStore::open_in_memory().await.unwrap();
        let service = RestaurantService::new(store, ScriptedGateway::new(), ClientConfig::default());
        service
            .gateway()
            .ok(json!([{ "id": 3, "name": "Kang Ho Dong" }]));

        let mut session = Session::new();
        let name = session
            .restaurant_from_url(&service, "./restaurant.html?id=3")
            .await
            .unwrap()
            .name
            .clone();
        assert_eq!(name, "Kang Ho Dong");

        // A later lookup keeps the session's restaurant even for another id
        let again = session
            .restaurant_from_url(&service, "./restaurant.html?id=4")
            .await
            .unwrap();
        assert_eq!(again.id, 3);
        assert_eq!(service.gateway().sent_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_id_is_rejected() {
        let service = RestaurantService::new(
            None::<LibSqlStore>,
            ScriptedGateway::new(),
            ClientConfig::default(),
        );
        let mut session = Session::new();

        let err = session
            .restaurant_from_url(&service, "./restaurant.html")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = session
            .restaurant_from_url(&service, "./restaurant.html?id=abc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(service.gateway().sent_count(), 0);
    }
}
