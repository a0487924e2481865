//! Request descriptions and endpoint builders

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::RestaurantId;
use crate::store::Table;

/// HTTP verbs used against the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two entity collections served by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Restaurants,
    Reviews,
}

impl EntityKind {
    /// Collection path segment
    pub const fn path(self) -> &'static str {
        match self {
            Self::Restaurants => "restaurants",
            Self::Reviews => "reviews",
        }
    }

    /// Local table mirroring this collection
    pub const fn table(self) -> Table {
        match self {
            Self::Restaurants => Table::Restaurants,
            Self::Reviews => Table::Reviews,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A complete, replayable HTTP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        Self {
            url: url.into(),
            method,
            headers,
            body: None,
        }
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        self.body = Some(body);
        self
    }
}

/// Builds requests against one backend base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection(&self, kind: EntityKind) -> String {
        format!("{}/{}", self.base_url, kind.path())
    }

    /// `GET /{kind}`
    pub fn list(&self, kind: EntityKind) -> ApiRequest {
        ApiRequest::new(HttpMethod::Get, self.collection(kind))
    }

    /// `GET /{kind}/{id}`
    pub fn fetch_one(&self, kind: EntityKind, id: i64) -> ApiRequest {
        ApiRequest::new(HttpMethod::Get, format!("{}/{id}", self.collection(kind)))
    }

    /// `GET /reviews?restaurant_id={id}`
    pub fn reviews_for(&self, restaurant_id: RestaurantId) -> ApiRequest {
        let id = restaurant_id.to_string();
        ApiRequest::new(
            HttpMethod::Get,
            format!(
                "{}?restaurant_id={}",
                self.collection(EntityKind::Reviews),
                urlencoding::encode(&id)
            ),
        )
    }

    /// `POST /{kind}`
    pub fn create(&self, kind: EntityKind, body: JsonValue) -> ApiRequest {
        ApiRequest::new(HttpMethod::Post, self.collection(kind)).with_body(body)
    }

    /// `PUT /{kind}/{id}`
    pub fn update(&self, kind: EntityKind, id: i64, body: JsonValue) -> ApiRequest {
        ApiRequest::new(HttpMethod::Put, format!("{}/{id}", self.collection(kind)))
            .with_body(body)
    }

    /// `DELETE /{kind}/{id}`
    pub fn remove(&self, kind: EntityKind, id: i64) -> ApiRequest {
        ApiRequest::new(HttpMethod::Delete, format!("{}/{id}", self.collection(kind)))
    }

    /// `PUT /restaurants/{id}/?is_favourite={flag}`
    pub fn favourite(&self, restaurant_id: RestaurantId, is_favourite: bool) -> ApiRequest {
        ApiRequest::new(
            HttpMethod::Put,
            format!(
                "{}/{restaurant_id}/?is_favourite={is_favourite}",
                self.collection(EntityKind::Restaurants)
            ),
        )
    }
}
