pub mod apify;
pub mod browser;
pub mod mock;
pub mod traits;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

pub use apify::ApifyProvider;
pub use browser::BrowserProvider;
pub use mock::MockProvider;
pub use traits::ListingProvider;
pub use types::SearchQuery;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::models::CandidateListing;

/// The availability backend, chosen once at construction.
///
/// There is no runtime fallback between variants: a failing Apify run
/// surfaces as an error instead of silently switching to mock data.
pub enum ProviderBackend {
    Mock(MockProvider),
    Apify(ApifyProvider),
    Browser(BrowserProvider),
}

impl ProviderBackend {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let backend = match config {
            ProviderConfig::Mock { delay } => ProviderBackend::Mock(MockProvider::new(*delay)),
            ProviderConfig::Apify(apify) => ProviderBackend::Apify(ApifyProvider::new(apify.clone())?),
            ProviderConfig::Browser { settle_time } => {
                ProviderBackend::Browser(BrowserProvider::new(*settle_time))
            }
        };
        info!(provider = backend.source_name(), "Availability provider initialized");
        Ok(backend)
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, ProviderBackend::Mock(_))
    }
}

#[async_trait]
impl ListingProvider for ProviderBackend {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateListing>, ProviderError> {
        match self {
            ProviderBackend::Mock(provider) => provider.search(query).await,
            ProviderBackend::Apify(provider) => provider.search(query).await,
            ProviderBackend::Browser(provider) => provider.search(query).await,
        }
    }

    fn source_name(&self) -> &'static str {
        match self {
            ProviderBackend::Mock(provider) => provider.source_name(),
            ProviderBackend::Apify(provider) => provider.source_name(),
            ProviderBackend::Browser(provider) => provider.source_name(),
        }
    }
}
