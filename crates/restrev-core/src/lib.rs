//! restrev-core - Core library for restrev
//!
//! This crate contains the models, local store, remote gateway, offline
//! mutation queue and sync reconciler shared by every restrev front-end.

pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod remote;
pub mod services;
pub mod session;
pub mod store;
pub mod sync;
pub mod util;

pub use config::{ClientConfig, DrainPolicy};
pub use error::{Error, NetworkError, Result};
pub use models::{Restaurant, RestaurantId, Review, ReviewDraft, ReviewId, ReviewUpdate};
pub use services::{RestaurantService, WriteOutcome};
pub use store::{Keyed, LibSqlStore, LocalStore, StoreKey};
pub use sync::DrainReport;
