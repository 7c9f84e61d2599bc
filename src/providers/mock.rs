use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::constants::{AIRBNB_BASE_URL, MOCK_MAX_PROPERTIES, MOCK_MIN_PROPERTIES};
use crate::error::ProviderError;
use crate::models::CandidateListing;
use crate::providers::traits::ListingProvider;
use crate::providers::types::SearchQuery;

const PROPERTY_TYPES: [&str; 10] = [
    "Cozy Studio Apartment",
    "Modern Loft",
    "Spacious 2BR Apartment",
    "Charming Cottage",
    "Luxury Penthouse",
    "Beach House",
    "Mountain Cabin",
    "Downtown Condo",
    "Historic Townhouse",
    "Garden Villa",
];

const AMENITIES: [&str; 10] = [
    "with City Views",
    "near Downtown",
    "with Pool",
    "with Parking",
    "Pet Friendly",
    "with Balcony",
    "with Kitchen",
    "with Workspace",
    "with Garden",
    "Waterfront",
];

/// Offline provider generating plausible listings without network access.
///
/// The population for a location is stable across calls, and a dated
/// search hides roughly a quarter of it, so both the direct-match and the
/// differential detection paths can be exercised locally.
#[derive(Debug, Clone)]
pub struct MockProvider {
    delay: Duration,
}

impl MockProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Deterministic listing population for a location
    pub fn population(query: &SearchQuery) -> Vec<CandidateListing> {
        let location = if query.location.trim().is_empty() {
            "Unknown Location".to_string()
        } else {
            query.location.trim().to_string()
        };
        let seed = hash_of(&location.to_lowercase());
        let spread = (MOCK_MAX_PROPERTIES - MOCK_MIN_PROPERTIES + 1) as u64;
        let count = MOCK_MIN_PROPERTIES + (seed % spread) as usize;
        let guests = query.total_guests().max(1);

        (0..count)
            .map(|i| {
                let item_seed = hash_of(&(seed, i));
                let property_type = PROPERTY_TYPES[(item_seed % 10) as usize];
                let amenity = AMENITIES[((item_seed / 10) % 10) as usize];
                let property_id = (10_000_000 + item_seed % 90_000_000).to_string();

                let base_price = match property_type {
                    "Luxury Penthouse" => 300 + item_seed % 500,
                    "Cozy Studio Apartment" => 60 + item_seed % 90,
                    _ => 80 + item_seed % 320,
                };
                let price = base_price + u64::from(guests.saturating_sub(2)) * 20;

                CandidateListing {
                    url: format!("{AIRBNB_BASE_URL}/rooms/{property_id}"),
                    property_id,
                    name: format!("{property_type} {amenity}"),
                    location: location.clone(),
                    price: format!("${price}"),
                    guests,
                    image_url: Some(format!(
                        "https://placehold.co/600x400/1e293b/94a3b8?text={}",
                        property_type.replace(' ', "+")
                    )),
                }
            })
            .collect()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl ListingProvider for MockProvider {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateListing>, ProviderError> {
        warn!("USING MOCK MODE - generating fake property data");
        info!(
            location = %query.location,
            check_in = ?query.check_in,
            check_out = ?query.check_out,
            guests = query.total_guests(),
            "[MOCK] Searching properties"
        );

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut listings = Self::population(query);
        if let (Some(check_in), Some(check_out)) = (query.check_in, query.check_out) {
            listings.retain(|listing| hash_of(&(&listing.property_id, check_in, check_out)) % 4 != 0);
        }
        listings.truncate(query.max_results);

        info!("[MOCK] Returning {} properties", listings.len());
        Ok(listings)
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn query(location: &str) -> SearchQuery {
        SearchQuery {
            location: location.to_string(),
            max_results: 50,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn population_is_stable_per_location() {
        let provider = MockProvider::default();
        let first = provider.search(&query("Austin, TX")).await.unwrap();
        let second = provider.search(&query("Austin, TX")).await.unwrap();

        assert_eq!(first, second);
        assert!((MOCK_MIN_PROPERTIES..=MOCK_MAX_PROPERTIES).contains(&first.len()));
        assert!(first.iter().all(|l| l.url.ends_with(&format!("/rooms/{}", l.property_id))));
    }

    #[tokio::test]
    async fn dated_search_is_a_subset() {
        let provider = MockProvider::default();
        let undated = provider.search(&query("Lisbon")).await.unwrap();
        let dated = provider
            .search(&SearchQuery {
                check_in: NaiveDate::from_ymd_opt(2024, 6, 15),
                check_out: NaiveDate::from_ymd_opt(2024, 6, 18),
                ..query("Lisbon")
            })
            .await
            .unwrap();

        assert!(dated.len() <= undated.len());
        assert!(dated.iter().all(|l| undated.contains(l)));
    }

    #[tokio::test]
    async fn respects_max_results() {
        let provider = MockProvider::default();
        let listings = provider
            .search(&SearchQuery {
                max_results: 3,
                ..query("Paris")
            })
            .await
            .unwrap();
        assert_eq!(listings.len(), 3);
    }
}
