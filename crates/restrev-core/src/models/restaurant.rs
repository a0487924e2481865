//! Restaurant model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::lenient;

/// Server-assigned restaurant identifier
pub type RestaurantId = i64;

/// Sentinel filter value meaning "no filter on this dimension"
pub const ALL: &str = "all";

/// Map coordinates of a restaurant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A restaurant as served by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    /// Unique identifier
    #[serde(deserialize_with = "lenient::int")]
    pub id: RestaurantId,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub cuisine_type: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub latlng: Option<LatLng>,
    /// Day name to opening hours text
    #[serde(default)]
    pub operating_hours: BTreeMap<String, String>,
    /// Photograph base name; falls back to the id when absent
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub photograph: Option<String>,
    /// Persisted as `"true"` / `"false"` so the favourites index can match it
    #[serde(default, with = "lenient::flag")]
    pub is_favourite: bool,
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

impl Restaurant {
    /// Create a restaurant with only the required fields set
    pub fn new(id: RestaurantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: String::new(),
            cuisine_type: String::new(),
            neighborhood: String::new(),
            latlng: None,
            operating_hours: BTreeMap::new(),
            photograph: None,
            is_favourite: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// Relative URL of the restaurant detail page
    #[must_use]
    pub fn url(&self) -> String {
        format!("./restaurant.html?id={}", self.id)
    }

    /// Relative URL of the restaurant photograph
    #[must_use]
    pub fn image_url(&self) -> String {
        match self.photograph.as_deref().map(str::trim) {
            Some(photo) if !photo.is_empty() => format!("/img/{photo}.jpeg"),
            _ => format!("/img/{}.jpeg", self.id),
        }
    }

    /// Check the cuisine/neighborhood equality filters; `"all"` disables a filter
    #[must_use]
    pub fn matches(&self, cuisine: &str, neighborhood: &str) -> bool {
        (cuisine == ALL || self.cuisine_type == cuisine)
            && (neighborhood == ALL || self.neighborhood == neighborhood)
    }
}

/// Distinct values of `field` across `restaurants`, in first-seen order
pub fn unique_values<'a>(
    restaurants: &'a [Restaurant],
    field: impl Fn(&'a Restaurant) -> &'a str,
) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for restaurant in restaurants {
        let value = field(restaurant);
        if !values.iter().any(|seen| seen == value) {
            values.push(value.to_string());
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample(id: RestaurantId, cuisine: &str, neighborhood: &str) -> Restaurant {
        Restaurant {
            cuisine_type: cuisine.to_string(),
            neighborhood: neighborhood.to_string(),
            ..Restaurant::new(id, format!("Restaurant {id}"))
        }
    }

    #[test]
    fn decodes_minimal_record() {
        let restaurant: Restaurant = serde_json::from_str(r#"{"id":42,"name":"Cafe"}"#).unwrap();
        assert_eq!(restaurant, Restaurant::new(42, "Cafe"));
    }

    #[test]
    fn decodes_backend_record() {
        let restaurant: Restaurant = serde_json::from_str(
            r#"{
                "id": "1",
                "name": "Mission Chinese Food",
                "neighborhood": "Manhattan",
                "photograph": 1,
                "address": "171 E Broadway, New York, NY 10002",
                "latlng": { "lat": 40.713829, "lng": -73.989667 },
                "cuisine_type": "Asian",
                "operating_hours": { "Monday": "5:30 pm - 11:00 pm" },
                "createdAt": 1504095567183,
                "updatedAt": "2018-06-01T12:00:00.000Z",
                "is_favourite": true
            }"#,
        )
        .unwrap();

        assert_eq!(restaurant.id, 1);
        assert_eq!(restaurant.photograph.as_deref(), Some("1"));
        assert!(restaurant.is_favourite);
        assert_eq!(restaurant.created_at, Some(1_504_095_567_183));
        assert_eq!(restaurant.updated_at, Some(1_527_854_400_000));
        assert_eq!(
            restaurant.operating_hours.get("Monday").map(String::as_str),
            Some("5:30 pm - 11:00 pm")
        );
    }

    #[test]
    fn favourite_flag_serializes_as_string() {
        let mut restaurant = Restaurant::new(3, "Kang Ho Dong Baekjeong");
        restaurant.is_favourite = true;
        let value = serde_json::to_value(&restaurant).unwrap();
        assert_eq!(value["is_favourite"], "true");
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn urls_fall_back_to_id() {
        let mut restaurant = Restaurant::new(7, "Tuk Tuk");
        assert_eq!(restaurant.url(), "./restaurant.html?id=7");
        assert_eq!(restaurant.image_url(), "/img/7.jpeg");
        restaurant.photograph = Some("tuk".to_string());
        assert_eq!(restaurant.image_url(), "/img/tuk.jpeg");
    }

    #[test]
    fn all_sentinel_disables_filter() {
        let restaurant = sample(1, "Pizza", "Downtown");
        assert!(restaurant.matches(ALL, "Downtown"));
        assert!(restaurant.matches("Pizza", ALL));
        assert!(restaurant.matches(ALL, ALL));
        assert!(!restaurant.matches("Asian", ALL));
        assert!(!restaurant.matches(ALL, "Queens"));
    }

    #[test]
    fn unique_values_keep_first_seen_order() {
        let restaurants = vec![
            sample(1, "Pizza", "Downtown"),
            sample(2, "Asian", "Queens"),
            sample(3, "Pizza", "Brooklyn"),
            sample(4, "Mexican", "Queens"),
        ];
        assert_eq!(
            unique_values(&restaurants, |r| r.cuisine_type.as_str()),
            vec!["Pizza", "Asian", "Mexican"]
        );
        assert_eq!(
            unique_values(&restaurants, |r| r.neighborhood.as_str()),
            vec!["Downtown", "Queens", "Brooklyn"]
        );
    }
}
