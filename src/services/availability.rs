use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ProviderError;
use crate::models::{room_id_from_url, CandidateListing, ScanResult, Watch};
use crate::providers::{ListingProvider, SearchQuery};

/// Decides whether one watched listing is bookable for its dates.
///
/// The provider only answers searches, so the watch's own criteria are
/// searched and the batch is scanned for the watched listing. Provider
/// errors are returned to the caller untouched.
#[derive(Clone)]
pub struct AvailabilityChecker {
    provider: Arc<dyn ListingProvider>,
}

impl AvailabilityChecker {
    pub fn new(provider: Arc<dyn ListingProvider>) -> Self {
        Self { provider }
    }

    pub async fn check(
        &self,
        watch: &Watch,
    ) -> Result<(ScanResult, Option<CandidateListing>), ProviderError> {
        let query = SearchQuery::for_watch(watch);
        info!(
            watch_id = %watch.id,
            location = %query.location,
            check_in = %watch.check_in_date,
            check_out = %watch.check_out_date,
            guests = watch.guests,
            provider = self.provider.source_name(),
            "Checking availability"
        );

        let listings = self.provider.search(&query).await?;
        if listings.is_empty() {
            debug!(watch_id = %watch.id, "Provider returned no listings");
            return Ok((ScanResult::Unavailable, None));
        }

        match find_match(watch, &listings) {
            Some(listing) => {
                info!(watch_id = %watch.id, property_id = %listing.property_id, "Watched property is available");
                Ok((ScanResult::Available, Some(listing.clone())))
            }
            None => {
                debug!(watch_id = %watch.id, candidates = listings.len(), "Watched property not in results");
                Ok((ScanResult::Unavailable, None))
            }
        }
    }
}

/// First listing that refers to the watched property.
///
/// Tries normalized URL equality, then the `/rooms/<id>` ids of both URLs,
/// then the stored property id.
pub fn find_match<'a>(watch: &Watch, listings: &'a [CandidateListing]) -> Option<&'a CandidateListing> {
    let watch_url = normalize_url(&watch.property_url);
    let watch_room = room_id_from_url(&watch.property_url);
    let watch_property = watch.property_id.trim();

    listings.iter().find(|listing| {
        if !watch_url.is_empty() && normalize_url(&listing.url) == watch_url {
            return true;
        }
        if let (Some(watched), Some(candidate)) = (&watch_room, room_id_from_url(&listing.url)) {
            if *watched == candidate {
                return true;
            }
        }
        !watch_property.is_empty() && listing.property_id.trim() == watch_property
    })
}

fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::watch::tests::sample_watch;
    use async_trait::async_trait;

    struct FixedProvider(Result<Vec<CandidateListing>, String>);

    #[async_trait]
    impl ListingProvider for FixedProvider {
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<CandidateListing>, ProviderError> {
            self.0.clone().map_err(ProviderError::RunFailed)
        }

        fn source_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn listing(id: &str, url: &str) -> CandidateListing {
        CandidateListing {
            property_id: id.to_string(),
            name: format!("Listing {id}"),
            url: url.to_string(),
            location: "Austin, TX".to_string(),
            price: "$100".to_string(),
            guests: 2,
            image_url: None,
        }
    }

    fn checker(result: Result<Vec<CandidateListing>, String>) -> AvailabilityChecker {
        AvailabilityChecker::new(Arc::new(FixedProvider(result)))
    }

    #[tokio::test]
    async fn matches_by_room_id_despite_query_string() {
        let batch = vec![
            listing("111", "https://www.airbnb.com/rooms/111"),
            listing("222", "https://www.airbnb.com/rooms/222?x=1"),
        ];
        let (result, matched) = checker(Ok(batch)).check(&sample_watch("w", "u")).await.unwrap();

        assert_eq!(result, ScanResult::Available);
        assert_eq!(matched.unwrap().property_id, "222");
    }

    #[tokio::test]
    async fn empty_batch_is_unavailable() {
        let (result, matched) = checker(Ok(vec![])).check(&sample_watch("w", "u")).await.unwrap();
        assert_eq!(result, ScanResult::Unavailable);
        assert!(matched.is_none());
    }

    #[tokio::test]
    async fn no_match_is_unavailable() {
        let batch = vec![listing("333", "https://www.airbnb.com/rooms/333")];
        let (result, matched) = checker(Ok(batch)).check(&sample_watch("w", "u")).await.unwrap();
        assert_eq!(result, ScanResult::Unavailable);
        assert!(matched.is_none());
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let outcome = checker(Err("rate limited".to_string()))
            .check(&sample_watch("w", "u"))
            .await;
        assert!(matches!(outcome, Err(ProviderError::RunFailed(msg)) if msg == "rate limited"));
    }

    #[test]
    fn url_match_ignores_case_and_trailing_slash() {
        let mut watch = sample_watch("w", "u");
        watch.property_url = "https://www.airbnb.com/h/cosy-loft".to_string();
        watch.property_id = String::new();
        let batch = vec![listing("", " HTTPS://www.airbnb.com/h/Cosy-Loft/ ")];
        assert!(find_match(&watch, &batch).is_some());
    }

    #[test]
    fn property_id_is_last_resort() {
        let mut watch = sample_watch("w", "u");
        watch.property_url = "https://www.airbnb.com/h/cosy-loft".to_string();
        let batch = vec![
            listing("", "https://www.airbnb.com/h/other"),
            listing("222", "https://www.airbnb.com/h/renamed"),
        ];
        assert_eq!(find_match(&watch, &batch).unwrap().property_id, "222");
    }

    #[test]
    fn first_match_wins() {
        let batch = vec![
            listing("222", "https://www.airbnb.com/rooms/222?first"),
            listing("222", "https://www.airbnb.com/rooms/222"),
        ];
        let matched = find_match(&sample_watch("w", "u"), &batch).unwrap();
        assert!(matched.url.ends_with("?first"));
    }
}
