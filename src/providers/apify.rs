use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ApifyConfig;
use crate::error::ProviderError;
use crate::models::CandidateListing;
use crate::providers::traits::ListingProvider;
use crate::providers::types::SearchQuery;

/// State of an actor run as reported by the runs endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunState {
    Succeeded { dataset_id: String },
    Pending(String),
    Failed(String),
    Aborted,
    TimedOut,
    Unknown(String),
}

impl RunState {
    fn from_response(body: &Value) -> Result<Self, ProviderError> {
        let data = &body["data"];
        let status = data["status"].as_str().unwrap_or_default();
        let state = match status {
            "SUCCEEDED" => {
                let dataset_id = data["defaultDatasetId"].as_str().ok_or_else(|| {
                    ProviderError::Decode("no dataset ID returned from completed run".into())
                })?;
                RunState::Succeeded {
                    dataset_id: dataset_id.to_string(),
                }
            }
            "RUNNING" | "READY" => RunState::Pending(status.to_string()),
            "FAILED" => RunState::Failed(
                data["statusMessage"]
                    .as_str()
                    .unwrap_or("Unknown error")
                    .to_string(),
            ),
            "ABORTED" => RunState::Aborted,
            "TIMED-OUT" => RunState::TimedOut,
            other => RunState::Unknown(other.to_string()),
        };
        Ok(state)
    }
}

/// Availability provider backed by an Apify Airbnb scraping actor
pub struct ApifyProvider {
    client: Client,
    config: ApifyConfig,
}

impl ApifyProvider {
    pub fn new(config: ApifyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn actor_input(query: &SearchQuery) -> Value {
        let mut input = json!({
            "locationQuery": query.location,
            "maxListings": query.max_results,
            "currency": "USD",
            "proxyConfiguration": { "useApifyProxy": true },
        });
        if let Some(check_in) = query.check_in {
            input["checkIn"] = json!(check_in.to_string());
        }
        if let Some(check_out) = query.check_out {
            input["checkOut"] = json!(check_out.to_string());
        }
        if query.adults > 0 {
            input["adults"] = json!(query.adults);
        }
        if query.children > 0 {
            input["children"] = json!(query.children);
        }
        input
    }

    async fn run_search(&self, query: &SearchQuery) -> Result<Vec<CandidateListing>, ProviderError> {
        // Apify addresses "user/actor" ids as "user~actor" in URLs.
        let run_url = format!(
            "{}/acts/{}/runs",
            self.config.api_url,
            self.config.actor_id.replace('/', "~")
        );
        let input = Self::actor_input(query);

        info!(actor = %self.config.actor_id, location = %query.location, "Triggering Apify actor run");
        debug!("Actor input: {}", input);

        let response = self
            .client
            .post(&run_url)
            .bearer_auth(&self.config.api_token)
            .json(&input)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        let run_id = body["data"]["id"]
            .as_str()
            .ok_or_else(|| ProviderError::Decode("no run ID returned from Apify API".into()))?
            .to_string();

        info!(run_id = %run_id, "Polling for results");
        let dataset_id = self.poll_run(&run_id).await?;
        let listings = self.fetch_dataset(&dataset_id).await?;

        info!("Successfully scraped {} properties from Apify", listings.len());
        Ok(listings)
    }

    async fn poll_run(&self, run_id: &str) -> Result<String, ProviderError> {
        let run_url = format!("{}/actor-runs/{}", self.config.api_url, run_id);
        let attempts = self.config.max_poll_attempts;

        for attempt in 1..=attempts {
            let response = match self
                .client
                .get(&run_url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) if e.is_timeout() && attempt < attempts => {
                    warn!("Polling attempt {} timed out", attempt);
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
                Err(e) if e.is_timeout() => {
                    return Err(ProviderError::Timeout("polling for results timed out".into()))
                }
                Err(e) => return Err(e.into()),
            };

            if response.status() != StatusCode::OK {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api { status, body });
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| ProviderError::Decode(e.to_string()))?;

            match RunState::from_response(&body)? {
                RunState::Succeeded { dataset_id } => {
                    info!("Run succeeded after {} attempts", attempt);
                    return Ok(dataset_id);
                }
                RunState::Pending(status) => {
                    debug!("Run status: {}, attempt {}/{}", status, attempt, attempts);
                }
                RunState::Failed(message) => {
                    return Err(ProviderError::RunFailed(message));
                }
                RunState::Aborted => {
                    return Err(ProviderError::RunFailed("Apify run was aborted".into()));
                }
                RunState::TimedOut => {
                    return Err(ProviderError::Timeout("Apify run timed out".into()));
                }
                RunState::Unknown(status) => {
                    warn!("Unknown run status: {}", status);
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        Err(ProviderError::Timeout(format!(
            "results not ready after {} seconds",
            self.config.poll_interval.as_secs() * u64::from(attempts)
        )))
    }

    async fn fetch_dataset(&self, dataset_id: &str) -> Result<Vec<CandidateListing>, ProviderError> {
        let dataset_url = format!("{}/datasets/{}/items", self.config.api_url, dataset_id);
        let response = self
            .client
            .get(&dataset_url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let items: Vec<Value> = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("dataset fetch failed: {e}")))?;

        Ok(CandidateListing::from_json_batch(&items))
    }
}

#[async_trait]
impl ListingProvider for ApifyProvider {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateListing>, ProviderError> {
        match tokio::time::timeout(self.config.timeout, self.run_search(query)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "scraping operation timed out after {} seconds",
                self.config.timeout.as_secs()
            ))),
        }
    }

    fn source_name(&self) -> &'static str {
        "apify"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn run_state_reads_dataset_on_success() {
        let body = json!({ "data": { "status": "SUCCEEDED", "defaultDatasetId": "ds1" } });
        assert_eq!(
            RunState::from_response(&body).unwrap(),
            RunState::Succeeded {
                dataset_id: "ds1".to_string()
            }
        );
    }

    #[test]
    fn run_state_without_dataset_is_decode_error() {
        let body = json!({ "data": { "status": "SUCCEEDED" } });
        assert!(matches!(
            RunState::from_response(&body),
            Err(ProviderError::Decode(_))
        ));
    }

    #[test]
    fn run_state_maps_terminal_failures() {
        let failed = json!({ "data": { "status": "FAILED", "statusMessage": "blocked" } });
        assert_eq!(
            RunState::from_response(&failed).unwrap(),
            RunState::Failed("blocked".to_string())
        );
        let timed_out = json!({ "data": { "status": "TIMED-OUT" } });
        assert_eq!(RunState::from_response(&timed_out).unwrap(), RunState::TimedOut);
        let running = json!({ "data": { "status": "RUNNING" } });
        assert!(matches!(
            RunState::from_response(&running).unwrap(),
            RunState::Pending(_)
        ));
    }

    #[test]
    fn actor_input_omits_missing_dates() {
        let undated = ApifyProvider::actor_input(&SearchQuery {
            location: "Austin, TX".to_string(),
            ..Default::default()
        });
        assert!(undated.get("checkIn").is_none());
        assert_eq!(undated["adults"], 2);

        let dated = ApifyProvider::actor_input(&SearchQuery {
            location: "Austin, TX".to_string(),
            check_in: NaiveDate::from_ymd_opt(2024, 6, 15),
            check_out: NaiveDate::from_ymd_opt(2024, 6, 18),
            ..Default::default()
        });
        assert_eq!(dated["checkIn"], "2024-06-15");
        assert_eq!(dated["checkOut"], "2024-06-18");
    }
}
