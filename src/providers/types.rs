use chrono::NaiveDate;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::constants::{AIRBNB_BASE_URL, DEFAULT_MAX_RESULTS};
use crate::error::ProviderError;
use crate::models::Watch;

/// Search parameters sent to an availability provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// City or area to search in
    pub location: String,
    /// Check-in date; `None` searches the whole inventory
    pub check_in: Option<NaiveDate>,
    /// Check-out date
    pub check_out: Option<NaiveDate>,
    pub adults: u32,
    pub children: u32,
    /// Upper bound on listings returned
    pub max_results: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            location: String::new(),
            check_in: None,
            check_out: None,
            adults: 2,
            children: 0,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl SearchQuery {
    /// Dated search for a watch's criteria. The watch stores total guests,
    /// so they are all sent as adults.
    pub fn for_watch(watch: &Watch) -> Self {
        Self {
            location: watch.location.clone(),
            check_in: Some(watch.check_in_date),
            check_out: Some(watch.check_out_date),
            adults: watch.guests,
            children: 0,
            ..Default::default()
        }
    }

    /// Same search with the date constraint removed
    pub fn without_dates(&self) -> Self {
        Self {
            check_in: None,
            check_out: None,
            ..self.clone()
        }
    }

    pub fn total_guests(&self) -> u32 {
        self.adults + self.children
    }

    /// Airbnb search page URL for these parameters.
    ///
    /// The location becomes one percent-encoded path segment.
    pub fn search_url(&self) -> Result<String, ProviderError> {
        let slug = self.location.trim().replace(',', "-").replace(' ', "-");
        let mut url = Url::parse(AIRBNB_BASE_URL)
            .map_err(|e| ProviderError::Browser(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Browser(format!("{AIRBNB_BASE_URL} cannot be a base URL")))?
            .pop_if_empty()
            .extend(["s", slug.as_str(), "homes"]);

        let mut params = Vec::new();
        if let Some(check_in) = self.check_in {
            params.push(("checkin", check_in.to_string()));
        }
        if let Some(check_out) = self.check_out {
            params.push(("checkout", check_out.to_string()));
        }
        if self.adults > 0 {
            params.push(("adults", self.adults.to_string()));
        }
        if self.children > 0 {
            params.push(("children", self.children.to_string()));
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        Ok(url.to_string())
    }
}
