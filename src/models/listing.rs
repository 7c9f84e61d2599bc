use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::AIRBNB_BASE_URL;

const DEFAULT_NAME: &str = "Airbnb Property";
const DEFAULT_LOCATION: &str = "Unknown Location";
/// Shown when a provider could not read a listing's price
pub const PRICE_UNAVAILABLE: &str = "Price not available";
const DEFAULT_GUESTS: u32 = 2;

/// A listing returned by an availability provider for one search.
///
/// Transient: produced per scan and only used for matching and for the
/// notification message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateListing {
    /// Empty when the upstream record carried no usable identifier.
    pub property_id: String,
    pub name: String,
    pub url: String,
    pub location: String,
    pub price: String,
    pub guests: u32,
    pub image_url: Option<String>,
}

impl CandidateListing {
    /// Translates one loosely-shaped upstream record.
    ///
    /// Missing optional fields get defaults; only non-object items are
    /// rejected.
    pub fn from_json(item: &Value) -> Option<Self> {
        let obj = item.as_object()?;

        let url_field = first_string(item, &["propertyUrl", "url", "listingUrl"]);

        let property_id = first_string(item, &["propertyId", "id", "listingId"])
            .or_else(|| url_field.as_deref().and_then(room_id_from_url))
            .unwrap_or_default();

        let name = first_string(item, &["propertyName", "name", "title", "listingName"])
            .unwrap_or_else(|| DEFAULT_NAME.to_string());

        let location = first_string(item, &["location", "city", "neighborhood"])
            .or_else(|| {
                obj.get("address")
                    .and_then(|address| first_string(address, &["city"]))
            })
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        let price = obj
            .get("price")
            .or_else(|| obj.get("pricePerNight"))
            .and_then(price_text)
            .unwrap_or_else(|| PRICE_UNAVAILABLE.to_string());

        let image_url = first_string(item, &["imageUrl", "thumbnail", "pictureUrl"]).or_else(|| {
            obj.get("images")
                .and_then(Value::as_array)
                .and_then(|images| images.first())
                .and_then(|image| first_string(image, &["url"]))
        });

        let guests = ["guests", "maxGuests", "accommodates", "personCapacity"]
            .iter()
            .filter_map(|key| obj.get(*key))
            .find_map(guest_count)
            .unwrap_or(DEFAULT_GUESTS);

        let url = match url_field {
            Some(url) => url,
            None if !property_id.is_empty() => format!("{AIRBNB_BASE_URL}/rooms/{property_id}"),
            None => AIRBNB_BASE_URL.to_string(),
        };

        Some(Self {
            property_id,
            name,
            url,
            location,
            price,
            guests,
            image_url,
        })
    }

    /// The listing's price, unless it is a placeholder for an unreadable one.
    pub fn known_price(&self) -> Option<&str> {
        let price = self.price.trim();
        let unreadable = price.is_empty()
            || price == PRICE_UNAVAILABLE
            || price.trim_start_matches('$').chars().all(|c| c == '0' || c == '.');
        (!unreadable).then_some(price)
    }

    /// Translates a batch, dropping records that are not objects.
    pub fn from_json_batch(items: &[Value]) -> Vec<Self> {
        items.iter().filter_map(Self::from_json).collect()
    }
}

/// Extracts the numeric listing id from a `/rooms/<digits>` path segment.
///
/// The first match wins; strings without the pattern yield `None`.
pub fn room_id_from_url(url: &str) -> Option<String> {
    static ROOM_ID: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = ROOM_ID
        .get_or_init(|| Regex::new(r"/rooms/(\d+)").ok())
        .as_ref()?;
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn first_string(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn price_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => n.as_f64().map(|amount| format!("${}", amount as i64)),
        Value::Object(obj) => obj
            .get("amount")
            .or_else(|| obj.get("value"))
            .and_then(Value::as_f64)
            .map(|amount| format!("${}", amount as i64)),
        _ => None,
    }
}

fn guest_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().filter(|g| *g >= 1.0).map(|g| g as u32),
        Value::String(s) => s.trim().parse().ok().filter(|g| *g >= 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_first_room_id() {
        assert_eq!(
            room_id_from_url("https://www.airbnb.com/rooms/222?x=1").as_deref(),
            Some("222")
        );
        assert_eq!(
            room_id_from_url("/rooms/12/rooms/34").as_deref(),
            Some("12")
        );
        assert_eq!(room_id_from_url("https://www.airbnb.com/rooms/plus/9"), None);
        assert_eq!(room_id_from_url(""), None);
    }

    #[test]
    fn parses_apify_style_record() {
        let item = json!({
            "url": "https://www.airbnb.com/rooms/4242?adults=2",
            "title": "Garden Villa",
            "address": { "city": "Lisbon" },
            "pricePerNight": { "amount": 129.9, "currency": "USD" },
            "images": [{ "url": "https://img/1.jpg" }],
            "accommodates": "4"
        });

        let listing = CandidateListing::from_json(&item).unwrap();
        assert_eq!(listing.property_id, "4242");
        assert_eq!(listing.name, "Garden Villa");
        assert_eq!(listing.location, "Lisbon");
        assert_eq!(listing.price, "$129");
        assert_eq!(listing.image_url.as_deref(), Some("https://img/1.jpg"));
        assert_eq!(listing.guests, 4);
        assert_eq!(listing.url, "https://www.airbnb.com/rooms/4242?adults=2");
    }

    #[test]
    fn fills_defaults_for_sparse_record() {
        let listing = CandidateListing::from_json(&json!({ "id": 987 })).unwrap();
        assert_eq!(listing.property_id, "987");
        assert_eq!(listing.name, "Airbnb Property");
        assert_eq!(listing.location, "Unknown Location");
        assert_eq!(listing.price, "Price not available");
        assert_eq!(listing.guests, 2);
        assert_eq!(listing.url, "https://www.airbnb.com/rooms/987");

        let anonymous = CandidateListing::from_json(&json!({})).unwrap();
        assert!(anonymous.property_id.is_empty());
        assert_eq!(anonymous.url, "https://www.airbnb.com");
    }

    #[test]
    fn batch_skips_non_objects() {
        let items = vec![json!("garbage"), json!(null), json!({ "propertyId": "1" })];
        let listings = CandidateListing::from_json_batch(&items);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].property_id, "1");
    }
}
