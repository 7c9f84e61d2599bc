//! Differential booking detection.
//!
//! Providers expose no booking calendar. Instead the same location is
//! searched twice, once without dates (the full population) and once with
//! the requested dates (what is still bookable). A listing found only in
//! the first result is reported as booked.
//!
//! This is an approximation: listings that drop out of the dated search
//! for unrelated reasons (pagination drift, rate limiting, delisting) are
//! also reported as booked.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProviderError;
use crate::models::CandidateListing;
use crate::providers::{ListingProvider, SearchQuery};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub location: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: u32,
    pub children: u32,
    pub provider: String,
    pub detected_at: DateTime<Utc>,
    pub method: String,
}

/// Result of one differential detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingReport {
    pub booked_properties: Vec<CandidateListing>,
    pub available_properties: Vec<CandidateListing>,
    pub total_properties: usize,
    pub booked_count: usize,
    pub available_count: usize,
    pub search_metadata: SearchMetadata,
}

#[derive(Clone)]
pub struct BookingDetector {
    provider: Arc<dyn ListingProvider>,
}

impl BookingDetector {
    pub fn new(provider: Arc<dyn ListingProvider>) -> Self {
        Self { provider }
    }

    /// Run both searches for `query` (its dates are required) and classify
    /// the undated population.
    pub async fn detect(
        &self,
        query: &SearchQuery,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<BookingReport, ProviderError> {
        let dated_query = SearchQuery {
            check_in: Some(check_in),
            check_out: Some(check_out),
            ..query.clone()
        };

        info!(location = %query.location, "Fetching all properties (no dates)");
        let all = self.provider.search(&dated_query.without_dates()).await?;

        info!(
            location = %query.location,
            check_in = %check_in,
            check_out = %check_out,
            "Fetching available properties for dates"
        );
        let available = self.provider.search(&dated_query).await?;

        let (booked_properties, available_properties) = classify(all, &available);
        info!(
            booked = booked_properties.len(),
            available = available_properties.len(),
            "Booking detection complete"
        );

        Ok(BookingReport {
            total_properties: booked_properties.len() + available_properties.len(),
            booked_count: booked_properties.len(),
            available_count: available_properties.len(),
            booked_properties,
            available_properties,
            search_metadata: SearchMetadata {
                location: query.location.clone(),
                check_in,
                check_out,
                adults: query.adults,
                children: query.children,
                provider: self.provider.source_name().to_string(),
                detected_at: Utc::now(),
                method: "differential".to_string(),
            },
        })
    }
}

/// Split the undated population into (booked, available) by property id.
///
/// Listings without an id cannot be compared and are left out of both.
pub fn classify(
    all: Vec<CandidateListing>,
    dated: &[CandidateListing],
) -> (Vec<CandidateListing>, Vec<CandidateListing>) {
    let available_ids: HashSet<&str> = dated
        .iter()
        .map(|listing| listing.property_id.as_str())
        .filter(|id| !id.is_empty())
        .collect();

    all.into_iter()
        .filter(|listing| !listing.property_id.is_empty())
        .partition(|listing| !available_ids.contains(listing.property_id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Returns `all` for undated searches and `dated` otherwise
    struct TwoPhaseProvider {
        all: Vec<CandidateListing>,
        dated: Vec<CandidateListing>,
    }

    #[async_trait]
    impl ListingProvider for TwoPhaseProvider {
        async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateListing>, ProviderError> {
            Ok(if query.check_in.is_some() {
                self.dated.clone()
            } else {
                self.all.clone()
            })
        }

        fn source_name(&self) -> &'static str {
            "two-phase"
        }
    }

    fn listing(id: &str) -> CandidateListing {
        CandidateListing {
            property_id: id.to_string(),
            name: format!("Listing {id}"),
            url: format!("https://www.airbnb.com/rooms/{id}"),
            location: "Lisbon".to_string(),
            price: "$90".to_string(),
            guests: 2,
            image_url: None,
        }
    }

    fn ids(listings: &[CandidateListing]) -> Vec<&str> {
        listings.iter().map(|l| l.property_id.as_str()).collect()
    }

    #[tokio::test]
    async fn listings_missing_from_dated_search_are_booked() {
        let detector = BookingDetector::new(Arc::new(TwoPhaseProvider {
            all: vec![listing("1"), listing("2"), listing("3")],
            dated: vec![listing("2")],
        }));
        let query = SearchQuery {
            location: "Lisbon".to_string(),
            ..Default::default()
        };
        let check_in = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let check_out = NaiveDate::from_ymd_opt(2024, 6, 18).unwrap();

        let report = detector.detect(&query, check_in, check_out).await.unwrap();

        assert_eq!(ids(&report.booked_properties), vec!["1", "3"]);
        assert_eq!(ids(&report.available_properties), vec!["2"]);
        assert_eq!(report.booked_count, 2);
        assert_eq!(report.available_count, 1);
        assert_eq!(report.total_properties, 3);
        assert_eq!(report.search_metadata.method, "differential");
        assert_eq!(report.search_metadata.provider, "two-phase");
    }

    #[test]
    fn listings_without_id_are_ignored() {
        let (booked, available) = classify(vec![listing(""), listing("7")], &[listing("")]);
        assert_eq!(ids(&booked), vec!["7"]);
        assert!(available.is_empty());
    }
}
