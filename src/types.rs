//! Shared types for the STAYSCOUT engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that store, pricing, notify,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------------------

/// How often an alert is re-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Hourly,
    Every6Hours,
    Every12Hours,
    Daily,
    Weekly,
}

impl Frequency {
    /// All supported frequencies (useful for iteration).
    pub const ALL: &'static [Frequency] = &[
        Frequency::Hourly,
        Frequency::Every6Hours,
        Frequency::Every12Hours,
        Frequency::Daily,
        Frequency::Weekly,
    ];

    /// The wait between two checks at this frequency.
    pub fn interval(&self) -> chrono::Duration {
        match self {
            Frequency::Hourly => chrono::Duration::hours(1),
            Frequency::Every6Hours => chrono::Duration::hours(6),
            Frequency::Every12Hours => chrono::Duration::hours(12),
            Frequency::Daily => chrono::Duration::days(1),
            Frequency::Weekly => chrono::Duration::days(7),
        }
    }

    /// The canonical label stored in the database.
    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Every6Hours => "every_6_hours",
            Frequency::Every12Hours => "every_12_hours",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Attempt to parse a string into a Frequency (case-insensitive).
impl std::str::FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" | "1h" => Ok(Frequency::Hourly),
            "every_6_hours" | "6h" => Ok(Frequency::Every6Hours),
            "every_12_hours" | "12h" => Ok(Frequency::Every12Hours),
            "daily" | "1d" | "24h" => Ok(Frequency::Daily),
            "weekly" | "7d" => Ok(Frequency::Weekly),
            _ => Err(anyhow::anyhow!("Unknown frequency: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Alert
// ---------------------------------------------------------------------------

/// A user-defined hotel price alert.
///
/// Alerts are flat value records keyed by id — owner and notification
/// history live behind their own store lookups, never as embedded object
/// references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    /// External user identifier (chat user id); opaque to the engine.
    pub owner_id: String,
    /// City to search in, or the area a specific property sits in.
    pub location: String,
    /// Specific property to watch, if any.
    pub property_name: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    /// Amenities the stay must offer (applied server-side by the pricing
    /// source where supported).
    pub required_amenities: Vec<String>,
    pub free_cancellation: bool,
    /// Maximum acceptable price per night.
    pub max_price: Decimal,
    /// Minimum acceptable rating (0–5). Zero disables the check.
    pub min_rating: Decimal,
    /// Schedule label ("hourly", "every_6_hours", ...). Stored as text so
    /// an unrecognized value degrades to the daily interval instead of
    /// failing the row decode.
    pub frequency: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// None means due immediately.
    pub next_check_at: Option<DateTime<Utc>>,
    pub active: bool,
    /// Incremented once per cycle in which the owner was successfully
    /// notified, regardless of how many deals that cycle found.
    pub times_triggered: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} → {} ({} guests, ≤${}/night, {})",
            self.id,
            self.property_name.as_deref().unwrap_or(&self.location),
            self.check_in,
            self.check_out,
            self.guests,
            self.max_price,
            self.frequency,
        )
    }
}

impl Alert {
    /// Number of nights the alert covers.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Whether this alert should be picked up by a check run at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_check_at.map_or(true, |t| t <= now)
    }

    /// Validate criteria invariants at the store boundary.
    pub fn validate(&self) -> Result<(), ScoutError> {
        if self.location.trim().is_empty() {
            return Err(ScoutError::InvalidAlert("location is empty".into()));
        }
        if self.check_in >= self.check_out {
            return Err(ScoutError::InvalidAlert(format!(
                "check-in {} is not before check-out {}",
                self.check_in, self.check_out
            )));
        }
        if self.guests == 0 {
            return Err(ScoutError::InvalidAlert("guest count is zero".into()));
        }
        if self.max_price < Decimal::ZERO {
            return Err(ScoutError::InvalidAlert(format!(
                "max price {} is negative",
                self.max_price
            )));
        }
        if self.min_rating < Decimal::ZERO || self.min_rating > Decimal::from(5) {
            return Err(ScoutError::InvalidAlert(format!(
                "min rating {} is outside 0–5",
                self.min_rating
            )));
        }
        Ok(())
    }

    /// Build the pricing-source request for this alert.
    pub fn search_criteria(&self) -> SearchCriteria {
        SearchCriteria {
            location: self.location.clone(),
            property_name: self.property_name.clone(),
            check_in: self.check_in,
            check_out: self.check_out,
            guests: self.guests,
            max_price: Some(self.max_price),
            min_rating: if self.min_rating > Decimal::ZERO {
                Some(self.min_rating)
            } else {
                None
            },
            free_cancellation: self.free_cancellation,
        }
    }

    /// Helper to build a test alert with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        use rust_decimal_macros::dec;

        let now = Utc::now();
        Alert {
            id: Uuid::new_v4(),
            owner_id: "user-42".to_string(),
            location: "Paris".to_string(),
            property_name: None,
            check_in: NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            guests: 2,
            required_amenities: Vec::new(),
            free_cancellation: false,
            max_price: dec!(200),
            min_rating: Decimal::ZERO,
            frequency: "daily".to_string(),
            last_checked_at: None,
            next_check_at: None,
            active: true,
            times_triggered: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Search criteria & quotes
// ---------------------------------------------------------------------------

/// The logical request handed to the pricing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub location: String,
    pub property_name: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub max_price: Option<Decimal>,
    pub min_rating: Option<Decimal>,
    pub free_cancellation: bool,
}

/// A single live price for a stay, as returned by the pricing source.
/// Transient — never persisted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Source platform name (e.g. "booking").
    pub platform: String,
    pub hotel_name: String,
    pub price_per_night: Decimal,
    pub currency: String,
    pub total_price: Option<Decimal>,
    /// Rating on a 0–5 scale, when the platform provides one.
    pub rating: Option<Decimal>,
    pub booking_url: Option<String>,
}

impl fmt::Display for PriceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} — ${}/night on {}",
            self.hotel_name, self.price_per_night, self.platform
        )?;
        if let Some(r) = self.rating {
            write!(f, " (★{r})")?;
        }
        Ok(())
    }
}

/// A quote that passed the deal filter for a specific alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub alert_id: Uuid,
    pub quote: PriceQuote,
}

impl fmt::Display for Deal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.quote)
    }
}

/// What the pricing source reported for one search.
///
/// `success == false` covers both transport-level rejections mapped by the
/// client and failures the service itself reported.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub success: bool,
    pub quotes: Vec<PriceQuote>,
    pub error_message: Option<String>,
}

impl SearchOutcome {
    pub fn ok(quotes: Vec<PriceQuote>) -> Self {
        Self {
            success: true,
            quotes,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            quotes: Vec::new(),
            error_message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Check cycle results
// ---------------------------------------------------------------------------

/// How a single alert's check cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckOutcome {
    /// Pricing source answered, nothing under the threshold.
    NoDeals,
    /// Deals found and the owner was notified.
    Notified,
    /// Deals found but delivery failed; not retried this cycle.
    NotifyFailed,
    /// Pricing source unreachable or reported failure.
    SourceError,
    /// The rescheduled alert could not be written back.
    PersistError,
    /// Another in-flight cycle holds this alert's advisory lock.
    Skipped,
    /// The alert's processing task panicked; caught at the task boundary.
    Faulted,
}

impl CheckOutcome {
    /// Whether this outcome represents a failure of some part of the cycle.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            CheckOutcome::NotifyFailed
                | CheckOutcome::SourceError
                | CheckOutcome::PersistError
                | CheckOutcome::Faulted
        )
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::NoDeals => write!(f, "no-deals"),
            CheckOutcome::Notified => write!(f, "notified"),
            CheckOutcome::NotifyFailed => write!(f, "notify-failed"),
            CheckOutcome::SourceError => write!(f, "source-error"),
            CheckOutcome::PersistError => write!(f, "persist-error"),
            CheckOutcome::Skipped => write!(f, "skipped"),
            CheckOutcome::Faulted => write!(f, "faulted"),
        }
    }
}

/// The result of one alert's check cycle.
#[derive(Debug, Clone)]
pub struct CheckCycleResult {
    pub alert_id: Uuid,
    pub outcome: CheckOutcome,
    pub deals_found: usize,
    pub error: Option<String>,
}

impl CheckCycleResult {
    pub fn new(alert_id: Uuid, outcome: CheckOutcome, deals_found: usize) -> Self {
        Self {
            alert_id,
            outcome,
            deals_found,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn skipped(alert_id: Uuid) -> Self {
        Self::new(alert_id, CheckOutcome::Skipped, 0)
    }

    pub fn faulted(alert_id: Uuid, error: impl Into<String>) -> Self {
        Self::new(alert_id, CheckOutcome::Faulted, 0).with_error(error)
    }
}

impl fmt::Display for CheckCycleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} deals)",
            self.alert_id, self.outcome, self.deals_found
        )?;
        if let Some(e) = &self.error {
            write!(f, ": {e}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Aggregated statistics for one batch invocation of the check runner.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed: std::time::Duration,
    /// Alerts the store reported as due.
    pub due: usize,
    /// Cycles that ran to a persisted reschedule or an error — everything
    /// except lock skips and caught panics.
    pub processed: usize,
    pub notified: usize,
    pub no_deals: usize,
    pub source_errors: usize,
    pub notify_failures: usize,
    pub persist_errors: usize,
    pub skipped: usize,
    pub faulted: usize,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>, due: usize) -> Self {
        Self {
            started_at,
            elapsed: std::time::Duration::ZERO,
            due,
            processed: 0,
            notified: 0,
            no_deals: 0,
            source_errors: 0,
            notify_failures: 0,
            persist_errors: 0,
            skipped: 0,
            faulted: 0,
        }
    }

    /// Fold one cycle result into the counters.
    pub fn record(&mut self, result: &CheckCycleResult) {
        match result.outcome {
            CheckOutcome::Notified => {
                self.processed += 1;
                self.notified += 1;
            }
            CheckOutcome::NoDeals => {
                self.processed += 1;
                self.no_deals += 1;
            }
            CheckOutcome::SourceError => {
                self.processed += 1;
                self.source_errors += 1;
            }
            CheckOutcome::NotifyFailed => {
                self.processed += 1;
                self.notify_failures += 1;
            }
            CheckOutcome::PersistError => {
                self.processed += 1;
                self.persist_errors += 1;
            }
            CheckOutcome::Skipped => self.skipped += 1,
            CheckOutcome::Faulted => self.faulted += 1,
        }
    }

    /// Total error-class cycles in this run.
    pub fn errored(&self) -> usize {
        self.source_errors + self.notify_failures + self.persist_errors + self.faulted
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "due={} processed={} notified={} no_deals={} errored={} skipped={} ({}ms)",
            self.due,
            self.processed,
            self.notified,
            self.no_deals,
            self.errored(),
            self.skipped,
            self.elapsed.as_millis(),
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for STAYSCOUT.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Pricing source error: {0}")]
    Pricing(String),

    #[error("Notifier error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid alert: {0}")]
    InvalidAlert(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
