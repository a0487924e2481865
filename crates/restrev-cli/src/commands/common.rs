use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use restrev_core::queue::QueuedMutation;
use restrev_core::remote::HttpGateway;
use restrev_core::session::query_param;
use restrev_core::{
    ClientConfig, DrainPolicy, DrainReport, Keyed, LibSqlStore, Restaurant, RestaurantId,
    RestaurantService, Review, StoreKey, WriteOutcome,
};
use serde::Serialize;

use crate::error::CliError;

pub type Service = RestaurantService<Option<LibSqlStore>, HttpGateway>;

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Serialize)]
pub struct RestaurantListItem {
    pub id: RestaurantId,
    pub name: String,
    pub neighborhood: String,
    pub cuisine_type: String,
    pub address: String,
    pub is_favourite: bool,
    pub url: String,
}

impl From<&Restaurant> for RestaurantListItem {
    fn from(restaurant: &Restaurant) -> Self {
        Self {
            id: restaurant.id,
            name: restaurant.name.clone(),
            neighborhood: restaurant.neighborhood.clone(),
            cuisine_type: restaurant.cuisine_type.clone(),
            address: restaurant.address.clone(),
            is_favourite: restaurant.is_favourite,
            url: restaurant.url(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewListItem {
    pub key: StoreKey,
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub rating: u8,
    pub comments: String,
    pub pending: bool,
    pub relative_time: Option<String>,
}

impl ReviewListItem {
    pub fn new(key: StoreKey, review: &Review, now_ms: i64) -> Self {
        Self {
            pending: key.is_provisional(),
            key,
            restaurant_id: review.restaurant_id,
            name: review.name.clone(),
            rating: review.rating,
            comments: review.comments.clone(),
            relative_time: review
                .updated_at
                .or(review.created_at)
                .map(|timestamp| format_relative_time(timestamp, now_ms)),
        }
    }

    /// List item for a review fetched from the server
    pub fn confirmed(review: &Review, now_ms: i64) -> Option<Self> {
        review
            .id
            .map(|id| Self::new(StoreKey::Int(id), review, now_ms))
    }

    pub fn from_keyed(keyed: &Keyed<Review>, now_ms: i64) -> Self {
        Self::new(keyed.key.clone(), &keyed.value, now_ms)
    }
}

#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub position: Option<StoreKey>,
    pub method: String,
    pub url: String,
    pub entity: String,
    pub review: Option<StoreKey>,
    pub enqueued_at: i64,
    pub relative_time: String,
}

impl QueueItem {
    pub fn new(mutation: &QueuedMutation, now_ms: i64) -> Self {
        Self {
            position: mutation.queue_key.clone(),
            method: mutation.request.method.to_string(),
            url: mutation.request.url.clone(),
            entity: mutation.entity.to_string(),
            review: mutation.correlation_key.clone(),
            enqueued_at: mutation.enqueued_at,
            relative_time: format_relative_time(mutation.enqueued_at, now_ms),
        }
    }
}

/// What `show` was asked to display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestaurantTarget {
    Id(RestaurantId),
    PageUrl(String),
}

pub fn parse_restaurant_target(target: &str) -> Result<RestaurantTarget, CliError> {
    let target = target.trim();
    if let Ok(id) = target.parse::<RestaurantId>() {
        return Ok(RestaurantTarget::Id(id));
    }
    if query_param(target, "id").is_some() || target.contains('?') {
        return Ok(RestaurantTarget::PageUrl(target.to_string()));
    }
    Err(CliError::InvalidTarget(target.to_string()))
}

pub fn parse_review_key(raw: &str) -> Result<StoreKey, CliError> {
    if raw.trim().is_empty() {
        return Err(CliError::EmptyReviewKey);
    }
    Ok(raw.parse()?)
}

pub fn normalize_comments(parts: &[String]) -> Option<String> {
    let joined = parts.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn format_restaurant_lines(restaurants: &[Restaurant]) -> Vec<String> {
    restaurants
        .iter()
        .map(|restaurant| {
            let marker = if restaurant.is_favourite { "*" } else { " " };
            format!(
                "{:>4} {marker} {}  [{} / {}]",
                restaurant.id, restaurant.name, restaurant.neighborhood, restaurant.cuisine_type
            )
        })
        .collect()
}

pub fn format_review_lines(reviews: &[ReviewListItem]) -> Vec<String> {
    reviews
        .iter()
        .map(|review| {
            let pending = if review.pending { " (pending)" } else { "" };
            let when = review
                .relative_time
                .as_deref()
                .map(|time| format!(" {time}"))
                .unwrap_or_default();
            format!(
                "{}  {} {}{when}{pending}  {}",
                review.key,
                stars(review.rating),
                review.name,
                review_preview(&review.comments)
            )
        })
        .collect()
}

pub fn format_queue_lines(items: &[QueueItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let position = item
                .position
                .as_ref()
                .map_or_else(|| "?".to_string(), ToString::to_string);
            let review = item
                .review
                .as_ref()
                .map(|key| format!(" review={key}"))
                .unwrap_or_default();
            format!(
                "{position:>4}  {:<6} {}{review}  {}",
                item.method, item.url, item.relative_time
            )
        })
        .collect()
}

pub fn format_drain_report(report: &DrainReport) -> String {
    let mut line = format!(
        "Replayed {}, failed {}, remaining {}",
        report.replayed, report.failed, report.remaining
    );
    if report.halted {
        line.push_str(" (halted at first failure)");
    }
    line
}

pub fn describe_outcome<T>(outcome: &WriteOutcome<T>) -> String {
    match outcome {
        WriteOutcome::Sent(_) => "sent".to_string(),
        WriteOutcome::Queued {
            queue_key, cause, ..
        } => cause.as_ref().map_or_else(
            || format!("queued as #{queue_key} behind an unsent review"),
            |cause| format!("queued as #{queue_key} ({cause})"),
        ),
        WriteOutcome::Local(_) => "discarded locally".to_string(),
    }
}

fn stars(rating: u8) -> String {
    let filled = usize::from(rating.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

pub fn review_preview(comments: &str) -> String {
    let single_line = comments.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PREVIEW_CHARS {
        return single_line;
    }
    let truncated = single_line.chars().take(PREVIEW_CHARS - 3).collect::<String>();
    format!("{}...", truncated.trim_end())
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("RESTREV_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("restrev")
        .join("restrev.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Option<PathBuf> {
    cli_config_path
        .or_else(|| env::var_os("RESTREV_CONFIG").map(PathBuf::from))
        .or_else(|| dirs::config_dir().map(|dir| dir.join("restrev").join("config.json")))
}

/// Config file, then `RESTREV_*` environment, then command-line flags
pub fn load_config(
    config_path: Option<&Path>,
    api_url: Option<&str>,
    drain_policy: Option<DrainPolicy>,
) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::load(config_path)?;
    if let Some(url) = api_url {
        config = config.with_api_base_url(url);
    }
    if let Some(policy) = drain_policy {
        config.drain_policy = policy;
    }
    Ok(config.validated()?)
}

/// Opens the local cache and the HTTP gateway. A cache that cannot be
/// opened leaves the service running network-only.
pub async fn open_service(config: ClientConfig, db_path: &Path) -> Result<Service, CliError> {
    let store = match LibSqlStore::open(db_path).await {
        Ok(store) => Some(store),
        Err(error) => {
            tracing::warn!(
                "Local cache at {} unavailable, continuing without it: {error}",
                db_path.display()
            );
            None
        }
    };
    let gateway = HttpGateway::new(&config)?;
    tracing::debug!("Using backend {}", gateway.base_url());
    Ok(RestaurantService::new(store, gateway, config))
}
