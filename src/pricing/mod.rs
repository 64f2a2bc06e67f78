//! Pricing source integration.
//!
//! The engine talks to a hotel pricing service that fans a search out to
//! booking platforms and returns price-sorted quotes. One `POST /search`
//! per check cycle; transport failures and non-2xx responses both surface
//! as an unsuccessful outcome, never as a panic or a hang (the client
//! enforces a hard timeout).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{PriceQuote, SearchCriteria, SearchOutcome};

/// Abstraction over the remote hotel pricing service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingSource: Send + Sync {
    /// Run one search. `Err` means the call itself failed (transport,
    /// timeout); an unsuccessful search the service *reported* comes back
    /// as `Ok` with `success == false`.
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome>;

    /// Source name for logging and identification.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Wire types (scraper service JSON ↔ Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireSearchRequest<'a> {
    city: &'a str,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    hotel_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_rating: Option<Decimal>,
    free_cancellation: bool,
}

impl<'a> WireSearchRequest<'a> {
    fn from_criteria(criteria: &'a SearchCriteria) -> Self {
        Self {
            city: &criteria.location,
            check_in: criteria.check_in,
            check_out: criteria.check_out,
            guests: criteria.guests,
            hotel_name: criteria.property_name.as_deref(),
            max_price: criteria.max_price,
            min_rating: criteria.min_rating,
            free_cancellation: criteria.free_cancellation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireHotel {
    platform: String,
    name: String,
    /// Price per night.
    price: Decimal,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    total_price: Option<Decimal>,
    #[serde(default)]
    rating: Option<Decimal>,
    #[serde(default)]
    booking_url: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl From<WireHotel> for PriceQuote {
    fn from(hotel: WireHotel) -> Self {
        PriceQuote {
            platform: hotel.platform,
            hotel_name: hotel.name,
            price_per_night: hotel.price,
            currency: hotel.currency,
            total_price: hotel.total_price,
            rating: hotel.rating,
            booking_url: hotel.booking_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSearchResponse {
    success: bool,
    #[serde(default)]
    hotels: Vec<WireHotel>,
    #[serde(default)]
    error_message: Option<String>,
}

impl From<WireSearchResponse> for SearchOutcome {
    fn from(response: WireSearchResponse) -> Self {
        SearchOutcome {
            success: response.success,
            quotes: response.hotels.into_iter().map(PriceQuote::from).collect(),
            error_message: response.error_message,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

const SOURCE_NAME: &str = "scraper";

/// HTTP client for the pricing/scraper service.
pub struct ScraperClient {
    http: Client,
    base_url: String,
}

impl ScraperClient {
    /// Build a client against the service at `base_url`. The timeout bounds
    /// the whole call — a slow upstream is a source error, not a stall.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("STAYSCOUT/0.1.0 (hotel-price-alerts)")
            .build()
            .context("Failed to build HTTP client for pricing service")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl PricingSource for ScraperClient {
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome> {
        let url = format!("{}/search", self.base_url);
        let request = WireSearchRequest::from_criteria(criteria);

        debug!(
            url = %url,
            location = %criteria.location,
            check_in = %criteria.check_in,
            check_out = %criteria.check_out,
            "Searching hotel prices"
        );

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Pricing service request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Pricing service rejected search");
            return Ok(SearchOutcome::failed(format!(
                "pricing service returned {status}"
            )));
        }

        let parsed: WireSearchResponse = response
            .json()
            .await
            .context("Failed to parse pricing service response")?;

        let outcome = SearchOutcome::from(parsed);
        debug!(
            success = outcome.success,
            quotes = outcome.quotes.len(),
            "Search complete"
        );
        Ok(outcome)
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
