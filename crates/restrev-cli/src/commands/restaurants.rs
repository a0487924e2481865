use restrev_core::session::Session;
use restrev_core::{Restaurant, RestaurantId};
use serde::Serialize;

use crate::commands::common::{
    describe_outcome, format_restaurant_lines, format_review_lines, now_ms, parse_restaurant_target,
    RestaurantListItem, RestaurantTarget, ReviewListItem, Service,
};
use crate::error::CliError;

pub async fn run_restaurants(
    service: &Service,
    cuisine: &str,
    neighborhood: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let restaurants = match service
        .fetch_restaurants_by_cuisine_and_neighborhood(cuisine, neighborhood)
        .await
    {
        Ok(restaurants) => restaurants,
        Err(error) if error.is_network() => {
            let cached = cached_matching(service, cuisine, neighborhood).await?;
            if cached.is_empty() {
                return Err(error.into());
            }
            tracing::warn!("Backend unreachable, listing cached restaurants: {error}");
            cached
        }
        Err(error) => return Err(error.into()),
    };
    print_restaurants(&restaurants, as_json)
}

async fn cached_matching(
    service: &Service,
    cuisine: &str,
    neighborhood: &str,
) -> Result<Vec<Restaurant>, CliError> {
    let mut restaurants = service.cached_restaurants().await?;
    restaurants.retain(|restaurant| restaurant.matches(cuisine, neighborhood));
    restaurants.sort_by_key(|restaurant| restaurant.id);
    Ok(restaurants)
}

pub async fn run_favourites(service: &Service, as_json: bool) -> Result<(), CliError> {
    let restaurants = service.favourites().await?;
    print_restaurants(&restaurants, as_json)
}

pub async fn run_neighborhoods(service: &Service, as_json: bool) -> Result<(), CliError> {
    let neighborhoods = service.fetch_neighborhoods().await?;
    print_values(&neighborhoods, as_json)
}

pub async fn run_cuisines(service: &Service, as_json: bool) -> Result<(), CliError> {
    let cuisines = service.fetch_cuisines().await?;
    print_values(&cuisines, as_json)
}

pub async fn run_favourite(
    service: &Service,
    id: RestaurantId,
    remove: bool,
) -> Result<(), CliError> {
    let outcome = if remove {
        service.remove_favourite(id).await?
    } else {
        service.set_favourite(id).await?
    };

    let verb = if remove { "Unmarked" } else { "Marked" };
    println!("{verb} restaurant {id} ({})", describe_outcome(&outcome));
    Ok(())
}

#[derive(Debug, Serialize)]
struct RestaurantDetails {
    #[serde(flatten)]
    restaurant: Restaurant,
    image_url: String,
    reviews: Vec<ReviewListItem>,
}

pub async fn run_show(service: &Service, target: &str, as_json: bool) -> Result<(), CliError> {
    let restaurant = match parse_restaurant_target(target)? {
        RestaurantTarget::Id(id) => service.fetch_restaurant_by_id(id).await?,
        RestaurantTarget::PageUrl(url) => {
            let mut session = Session::new();
            session.restaurant_from_url(service, &url).await?.clone()
        }
    };
    let reviews = collect_reviews(service, restaurant.id).await?;

    if as_json {
        let details = RestaurantDetails {
            image_url: restaurant.image_url(),
            restaurant,
            reviews,
        };
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }

    for line in format_restaurant_details(&restaurant) {
        println!("{line}");
    }
    println!();
    if reviews.is_empty() {
        println!("No reviews yet!");
    } else {
        for line in format_review_lines(&reviews) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Server reviews followed by reviews still waiting to be sent. Falls back
/// to the whole cache when the server returned nothing.
async fn collect_reviews(
    service: &Service,
    restaurant_id: RestaurantId,
) -> Result<Vec<ReviewListItem>, CliError> {
    let now = now_ms();
    let live = service.fetch_restaurant_reviews(restaurant_id).await?;
    if live.is_empty() {
        return Ok(cached_review_items(service, restaurant_id, now, |_| true).await);
    }

    let mut items = live
        .iter()
        .filter_map(|review| ReviewListItem::confirmed(review, now))
        .collect::<Vec<_>>();
    items.extend(cached_review_items(service, restaurant_id, now, |item| item.pending).await);
    Ok(items)
}

async fn cached_review_items(
    service: &Service,
    restaurant_id: RestaurantId,
    now: i64,
    keep: impl Fn(&ReviewListItem) -> bool,
) -> Vec<ReviewListItem> {
    match service.cached_reviews(restaurant_id).await {
        Ok(cached) => cached
            .iter()
            .map(|keyed| ReviewListItem::from_keyed(keyed, now))
            .filter(|item| keep(item))
            .collect(),
        Err(error) => {
            tracing::debug!("No cached reviews: {error}");
            Vec::new()
        }
    }
}

pub fn format_restaurant_details(restaurant: &Restaurant) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{}",
        restaurant.name,
        if restaurant.is_favourite { " *" } else { "" }
    )];
    lines.push(format!("  Cuisine:      {}", restaurant.cuisine_type));
    lines.push(format!("  Neighborhood: {}", restaurant.neighborhood));
    lines.push(format!("  Address:      {}", restaurant.address));
    lines.push(format!("  Image:        {}", restaurant.image_url()));
    if !restaurant.operating_hours.is_empty() {
        lines.push("  Hours:".to_string());
        for (day, hours) in &restaurant.operating_hours {
            lines.push(format!("    {day:<10} {hours}"));
        }
    }
    lines
}

fn print_restaurants(restaurants: &[Restaurant], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let items = restaurants
            .iter()
            .map(RestaurantListItem::from)
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if restaurants.is_empty() {
        println!("No restaurants found");
    } else {
        for line in format_restaurant_lines(restaurants) {
            println!("{line}");
        }
    }
    Ok(())
}

fn print_values(values: &[String], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(values)?);
    } else {
        for value in values {
            println!("{value}");
        }
    }
    Ok(())
}
