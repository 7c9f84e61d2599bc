use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::constants::AIRBNB_BASE_URL;
use crate::error::ProviderError;
use crate::models::listing::PRICE_UNAVAILABLE;
use crate::models::{room_id_from_url, CandidateListing};
use crate::providers::traits::ListingProvider;
use crate::providers::types::SearchQuery;

/// CSS selectors for Airbnb search result cards
struct CardSelectors {
    card: Selector,
    link: Selector,
    title: Selector,
    subtitle: Selector,
    price: Selector,
    image: Selector,
}

impl CardSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            card: Selector::parse(r#"[data-testid="card-container"]"#).ok()?,
            link: Selector::parse(r#"a[href*="/rooms/"]"#).ok()?,
            title: Selector::parse(r#"[data-testid="listing-card-title"]"#).ok()?,
            subtitle: Selector::parse(r#"[data-testid="listing-card-subtitle"]"#).ok()?,
            price: Selector::parse(r#"[data-testid="price-availability-row"]"#).ok()?,
            image: Selector::parse("img").ok()?,
        })
    }
}

/// Browser-based provider loading Airbnb search pages in headless Chrome
#[derive(Debug, Clone)]
pub struct BrowserProvider {
    settle_time: Duration,
}

impl BrowserProvider {
    pub fn new(settle_time: Duration) -> Self {
        Self { settle_time }
    }

    /// Render the search page and return its HTML.
    ///
    /// Blocking; callers run it on the blocking thread pool.
    fn capture_page(url: &str, settle_time: Duration) -> Result<String> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab()?;

        info!("Opening search page {}", url);
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;

        // Let the result grid hydrate, then scroll to trigger lazy cards
        thread::sleep(settle_time);
        for _ in 0..3 {
            if let Err(e) = tab.evaluate("window.scrollBy(0, window.innerHeight)", false) {
                warn!("Error scrolling page: {}", e);
                break;
            }
            thread::sleep(Duration::from_millis(500));
        }

        let html_result = tab.evaluate("document.documentElement.outerHTML", false)?;
        let html = html_result
            .value
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();

        debug!("Captured {} bytes of HTML", html.len());
        Ok(html)
    }
}

impl Default for BrowserProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(8))
    }
}

#[async_trait]
impl ListingProvider for BrowserProvider {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateListing>, ProviderError> {
        let url = query.search_url()?;
        let settle_time = self.settle_time;

        let html = tokio::task::spawn_blocking(move || Self::capture_page(&url, settle_time))
            .await
            .map_err(|e| ProviderError::Browser(format!("browser task failed: {e}")))?
            .map_err(|e| ProviderError::Browser(format!("{e:#}")))?;

        if html.is_empty() {
            warn!("HTML is empty");
            return Ok(Vec::new());
        }

        let listings = parse_search_results(&html, query.total_guests(), query.max_results);
        info!("Successfully scraped {} properties from search page", listings.len());
        Ok(listings)
    }

    fn source_name(&self) -> &'static str {
        "browser"
    }
}

/// Extract listing cards from a rendered Airbnb search page
pub fn parse_search_results(html: &str, guests: u32, max_results: usize) -> Vec<CandidateListing> {
    let Some(selectors) = CardSelectors::new() else {
        warn!("Card selectors failed to compile");
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let cards: Vec<_> = document.select(&selectors.card).collect();
    info!("Found {} listing cards in HTML", cards.len());

    cards
        .into_iter()
        .filter_map(|card| parse_card(card, &selectors, guests))
        .take(max_results)
        .collect()
}

fn parse_card(card: ElementRef<'_>, selectors: &CardSelectors, guests: u32) -> Option<CandidateListing> {
    let href = card
        .select(&selectors.link)
        .next()
        .and_then(|link| link.value().attr("href"))?;

    let url = if href.starts_with('/') {
        format!("{AIRBNB_BASE_URL}{href}")
    } else {
        href.to_string()
    };
    let property_id = room_id_from_url(&url)?;

    let text_of = |selector: &Selector| {
        card.select(selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
    };

    let name = text_of(&selectors.title).unwrap_or_else(|| "Property".to_string());
    let location = text_of(&selectors.subtitle).unwrap_or_else(|| "Unknown Location".to_string());
    let price = text_of(&selectors.price)
        .map(|raw| clean_price(&raw))
        .unwrap_or_else(|| PRICE_UNAVAILABLE.to_string());
    let image_url = card
        .select(&selectors.image)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    Some(CandidateListing {
        property_id,
        name,
        url,
        location,
        price,
        guests,
        image_url,
    })
}

/// Reduce a price row like "$182 night · $546 total" to "$182"
fn clean_price(raw: &str) -> String {
    static PRICE: OnceLock<Option<Regex>> = OnceLock::new();
    PRICE
        .get_or_init(|| Regex::new(r"\$[\d,]+").ok())
        .as_ref()
        .and_then(|re| re.find(raw))
        .map(|m| m.as_str().replace(',', ""))
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"
        <html><body>
          <div data-testid="card-container">
            <a href="/rooms/111?check_in=2024-06-15">
              <img src="https://img/111.jpg">
            </a>
            <div data-testid="listing-card-title">Modern Loft</div>
            <div data-testid="listing-card-subtitle"> Austin, TX </div>
            <div data-testid="price-availability-row">$1,182 night · $3,546 total</div>
          </div>
          <div data-testid="card-container">
            <a href="https://www.airbnb.com/rooms/222">link</a>
          </div>
          <div data-testid="card-container">
            <a href="/experiences/333">not a listing</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn parses_listing_cards() {
        let listings = parse_search_results(SEARCH_PAGE, 3, 10);
        assert_eq!(listings.len(), 2);

        let loft = &listings[0];
        assert_eq!(loft.property_id, "111");
        assert_eq!(loft.url, "https://www.airbnb.com/rooms/111?check_in=2024-06-15");
        assert_eq!(loft.name, "Modern Loft");
        assert_eq!(loft.location, "Austin, TX");
        assert_eq!(loft.price, "$1182");
        assert_eq!(loft.image_url.as_deref(), Some("https://img/111.jpg"));
        assert_eq!(loft.guests, 3);

        let bare = &listings[1];
        assert_eq!(bare.property_id, "222");
        assert_eq!(bare.name, "Property");
        assert_eq!(bare.price, PRICE_UNAVAILABLE);
        assert_eq!(bare.known_price(), None);
    }

    #[test]
    fn truncates_to_max_results() {
        assert_eq!(parse_search_results(SEARCH_PAGE, 2, 1).len(), 1);
    }

    #[test]
    fn empty_page_has_no_listings() {
        assert!(parse_search_results("<html></html>", 2, 10).is_empty());
    }
}
