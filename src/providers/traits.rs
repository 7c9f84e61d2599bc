use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::CandidateListing;
use crate::providers::types::SearchQuery;

/// Common trait for all availability providers.
///
/// A provider answers "which listings are bookable for this search"; it has
/// no notion of checking a single listing directly.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Search listings for a location, optionally constrained to dates
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateListing>, ProviderError>;

    /// Get the name of the provider backend
    fn source_name(&self) -> &'static str;
}
