use restrev_core::{Keyed, RestaurantId, Review, ReviewDraft, ReviewUpdate, WriteOutcome};

use crate::commands::common::{
    describe_outcome, format_review_lines, normalize_comments, now_ms, parse_review_key,
    ReviewListItem, Service,
};
use crate::error::CliError;

pub async fn run_list(
    service: &Service,
    restaurant_id: RestaurantId,
    cached: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let now = now_ms();
    let items = if cached {
        service
            .cached_reviews(restaurant_id)
            .await?
            .iter()
            .map(|keyed| ReviewListItem::from_keyed(keyed, now))
            .collect::<Vec<_>>()
    } else {
        service
            .fetch_restaurant_reviews(restaurant_id)
            .await?
            .iter()
            .filter_map(|review| ReviewListItem::confirmed(review, now))
            .collect::<Vec<_>>()
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No reviews yet!");
    } else {
        for line in format_review_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_add(
    service: &Service,
    restaurant_id: RestaurantId,
    name: &str,
    rating: u8,
    comments: &[String],
) -> Result<(), CliError> {
    let comments = normalize_comments(comments).ok_or(CliError::EmptyComments)?;
    let draft = ReviewDraft::new(restaurant_id, name, rating, comments);
    let outcome = service.create_review(draft).await?;
    print_review_outcome(&outcome);
    Ok(())
}

pub async fn run_edit(
    service: &Service,
    key: &str,
    name: Option<&str>,
    rating: Option<u8>,
    comments: &[String],
) -> Result<(), CliError> {
    let key = parse_review_key(key)?;
    let comments = normalize_comments(comments);

    let update = match (name, rating, comments) {
        (Some(name), Some(rating), Some(comments)) => ReviewUpdate::new(name, rating, comments),
        (name, rating, comments) => {
            let current = service
                .cached_review(&key)
                .await?
                .ok_or_else(|| CliError::ReviewNotCached(key.to_string()))?;
            ReviewUpdate::new(
                name.map_or(current.name, str::to_string),
                rating.unwrap_or(current.rating),
                comments.unwrap_or(current.comments),
            )
        }
    };

    let outcome = service.update_review(&key, update).await?;
    print_review_outcome(&outcome);
    Ok(())
}

pub async fn run_delete(service: &Service, key: &str) -> Result<(), CliError> {
    let key = parse_review_key(key)?;
    let outcome = service.delete_review(&key).await?;
    println!("{} ({})", outcome.value(), describe_outcome(&outcome));
    Ok(())
}

fn print_review_outcome(outcome: &WriteOutcome<Keyed<Review>>) {
    println!("{} ({})", outcome.value().key, describe_outcome(outcome));
}
