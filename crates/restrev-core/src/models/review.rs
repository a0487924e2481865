//! Review model

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::lenient;
use super::restaurant::RestaurantId;
use crate::error::{Error, Result};

/// Server-assigned review identifier
pub type ReviewId = i64;

/// Lowest accepted star rating
pub const MIN_RATING: u8 = 1;
/// Highest accepted star rating
pub const MAX_RATING: u8 = 5;

/// A review of a restaurant
///
/// `id` is absent while the review is provisional, i.e. created offline and
/// not yet confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(
        default,
        deserialize_with = "lenient::opt_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ReviewId>,
    #[serde(deserialize_with = "lenient::int")]
    pub restaurant_id: RestaurantId,
    pub name: String,
    #[serde(deserialize_with = "lenient::int")]
    pub rating: u8,
    #[serde(default)]
    pub comments: String,
    #[serde(
        default,
        rename = "createdAt",
        with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<i64>,
    #[serde(
        default,
        rename = "updatedAt",
        with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<i64>,
}

impl Review {
    /// Whether the review still waits for server confirmation
    pub const fn is_provisional(&self) -> bool {
        self.id.is_none()
    }

    /// Overwrite the user-editable fields
    pub fn apply(&mut self, update: &ReviewUpdate, now_ms: i64) {
        self.name.clone_from(&update.name);
        self.rating = update.rating;
        self.comments.clone_from(&update.comments);
        self.updated_at = Some(now_ms);
    }
}

/// Input for creating a review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDraft {
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub rating: u8,
    pub comments: String,
}

impl ReviewDraft {
    pub fn new(
        restaurant_id: RestaurantId,
        name: impl Into<String>,
        rating: u8,
        comments: impl Into<String>,
    ) -> Self {
        Self {
            restaurant_id,
            name: name.into(),
            rating,
            comments: comments.into(),
        }
    }

    /// Trim and check the draft before it goes anywhere near the network
    pub fn validated(self) -> Result<Self> {
        let fields = ReviewUpdate::new(self.name, self.rating, self.comments).validated()?;
        Ok(Self {
            restaurant_id: self.restaurant_id,
            name: fields.name,
            rating: fields.rating,
            comments: fields.comments,
        })
    }

    /// `POST /reviews` body
    pub fn create_body(&self) -> Value {
        json!({
            "name": self.name,
            "rating": self.rating,
            "restaurant_id": self.restaurant_id,
            "comments": self.comments,
        })
    }

    /// Local stand-in stored until the server confirms the review
    pub fn into_provisional(self, now_ms: i64) -> Review {
        Review {
            id: None,
            restaurant_id: self.restaurant_id,
            name: self.name,
            rating: self.rating,
            comments: self.comments,
            created_at: Some(now_ms),
            updated_at: Some(now_ms),
        }
    }
}

/// Input for editing a review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUpdate {
    pub name: String,
    pub rating: u8,
    pub comments: String,
}

impl ReviewUpdate {
    pub fn new(name: impl Into<String>, rating: u8, comments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rating,
            comments: comments.into(),
        }
    }

    pub fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation("reviewer name is required".to_string()));
        }
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(Error::Validation(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}, got {}",
                self.rating
            )));
        }
        let comments = self.comments.trim().to_string();
        if comments.is_empty() {
            return Err(Error::Validation("review comments are required".to_string()));
        }
        Ok(Self {
            name,
            rating: self.rating,
            comments,
        })
    }

    /// `PUT /reviews/{id}` body
    pub fn update_body(&self) -> Value {
        json!({
            "name": self.name,
            "rating": self.rating,
            "comments": self.comments,
        })
    }
}
