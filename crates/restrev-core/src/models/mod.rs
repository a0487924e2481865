//! Data models for restrev

pub mod lenient;
mod restaurant;
mod review;

pub use restaurant::{unique_values, LatLng, Restaurant, RestaurantId, ALL};
pub use review::{Review, ReviewDraft, ReviewId, ReviewUpdate, MAX_RATING, MIN_RATING};
