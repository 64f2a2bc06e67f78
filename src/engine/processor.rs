//! Single-alert check cycle.
//!
//! Runs one alert through query → filter → notify → reschedule, holding a
//! per-alert advisory lock for the duration so overlapping batch runs can
//! never double-fetch or double-notify the same alert. Whatever happens to
//! the pricing or notify calls, the alert is rescheduled and written back
//! exactly once; only a failed write leaves its stored state untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::filter::filter_deals;
use crate::engine::schedule::next_check_after;
use crate::notify::DealNotifier;
use crate::pricing::PricingSource;
use crate::store::AlertStore;
use crate::types::{Alert, CheckCycleResult, CheckOutcome, Frequency};

// ---------------------------------------------------------------------------
// Advisory locks
// ---------------------------------------------------------------------------

/// In-process advisory locks keyed by alert id.
///
/// `try_acquire` never waits: a contended alert belongs to an in-flight
/// cycle and will be retried by the next scheduler tick.
pub struct AlertLocks {
    held: DashMap<Uuid, ()>,
}

impl AlertLocks {
    pub fn new() -> Self {
        Self {
            held: DashMap::new(),
        }
    }

    /// Acquire the lock for `id`, or None if another cycle holds it.
    /// The guard releases on drop, on every exit path including unwinds.
    pub fn try_acquire(&self, id: Uuid) -> Option<AlertLockGuard<'_>> {
        match self.held.entry(id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(());
                Some(AlertLockGuard { locks: self, id })
            }
        }
    }

    pub fn is_held(&self, id: Uuid) -> bool {
        self.held.contains_key(&id)
    }
}

impl Default for AlertLocks {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AlertLockGuard<'a> {
    locks: &'a AlertLocks,
    id: Uuid,
}

impl Drop for AlertLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.remove(&self.id);
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Tunables for a single check cycle.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Maximum deals handed to the notifier per cycle; the rest are
    /// summarised as a "+N more" line.
    pub max_deals_per_notice: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_deals_per_notice: 5,
        }
    }
}

/// Processes one alert per call, against the store/pricing/notify seams.
pub struct AlertProcessor {
    store: Arc<dyn AlertStore>,
    pricing: Arc<dyn PricingSource>,
    notifier: Arc<dyn DealNotifier>,
    locks: Arc<AlertLocks>,
    config: ProcessorConfig,
}

impl AlertProcessor {
    pub fn new(
        store: Arc<dyn AlertStore>,
        pricing: Arc<dyn PricingSource>,
        notifier: Arc<dyn DealNotifier>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            pricing,
            notifier,
            locks: Arc::new(AlertLocks::new()),
            config,
        }
    }

    /// The advisory lock table, shared with whoever needs visibility.
    pub fn locks(&self) -> Arc<AlertLocks> {
        Arc::clone(&self.locks)
    }

    /// Run one full check cycle for `alert` at time `now`.
    pub async fn process(&self, mut alert: Alert, now: DateTime<Utc>) -> CheckCycleResult {
        let _guard = match self.locks.try_acquire(alert.id) {
            Some(guard) => guard,
            None => {
                debug!(alert_id = %alert.id, "Alert already being processed, skipping");
                return CheckCycleResult::skipped(alert.id);
            }
        };

        // 1. Query the pricing source.
        let criteria = alert.search_criteria();
        let (outcome, deals_found, error) = match self.pricing.search(&criteria).await {
            Ok(search) if search.success => {
                // 2. Filter quotes down to deals.
                let deals = filter_deals(&alert, &search.quotes);
                debug!(
                    alert_id = %alert.id,
                    quotes = search.quotes.len(),
                    deals = deals.len(),
                    "Quotes filtered"
                );

                if deals.is_empty() {
                    (CheckOutcome::NoDeals, 0, None)
                } else {
                    // 3. Notify the owner with a capped batch.
                    let total = deals.len();
                    let capped = &deals[..total.min(self.config.max_deals_per_notice)];
                    match self.notifier.notify_deals(&alert, capped, total).await {
                        Ok(()) => {
                            alert.times_triggered += 1;
                            info!(
                                alert_id = %alert.id,
                                owner_id = %alert.owner_id,
                                deals = total,
                                "Owner notified of deals"
                            );
                            (CheckOutcome::Notified, total, None)
                        }
                        Err(e) => {
                            warn!(
                                alert_id = %alert.id,
                                owner_id = %alert.owner_id,
                                error = %e,
                                "Deal notification failed, not retrying this cycle"
                            );
                            (CheckOutcome::NotifyFailed, total, Some(e.to_string()))
                        }
                    }
                }
            }
            Ok(search) => {
                let message = search
                    .error_message
                    .unwrap_or_else(|| "pricing source reported failure".to_string());
                warn!(alert_id = %alert.id, error = %message, "Pricing search unsuccessful");
                (CheckOutcome::SourceError, 0, Some(message))
            }
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Pricing search failed");
                (CheckOutcome::SourceError, 0, Some(e.to_string()))
            }
        };

        // 4. Reschedule and persist — on every path above, so a failing
        //    alert cannot monopolize future check runs.
        if alert.frequency.parse::<Frequency>().is_err() {
            warn!(
                alert_id = %alert.id,
                frequency = %alert.frequency,
                "Unrecognized frequency label, rescheduling on the daily interval"
            );
        }
        alert.last_checked_at = Some(now);
        alert.next_check_at = Some(next_check_after(&alert.frequency, now));

        match self.store.update(&alert).await {
            Ok(_) => {
                let mut result = CheckCycleResult::new(alert.id, outcome, deals_found);
                if let Some(e) = error {
                    result = result.with_error(e);
                }
                result
            }
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Failed to persist rescheduled alert");
                CheckCycleResult::new(alert.id, CheckOutcome::PersistError, deals_found)
                    .with_error(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockDealNotifier;
    use crate::pricing::MockPricingSource;
    use crate::store::MockAlertStore;
    use crate::types::{PriceQuote, SearchOutcome};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn quote(name: &str, price: Decimal) -> PriceQuote {
        PriceQuote {
            platform: "booking".to_string(),
            hotel_name: name.to_string(),
            price_per_night: price,
            currency: "USD".to_string(),
            total_price: None,
            rating: None,
            booking_url: None,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn processor(
        store: MockAlertStore,
        pricing: MockPricingSource,
        notifier: MockDealNotifier,
    ) -> AlertProcessor {
        AlertProcessor::new(
            Arc::new(store),
            Arc::new(pricing),
            Arc::new(notifier),
            ProcessorConfig::default(),
        )
    }

    // -- Lock table tests --

    #[test]
    fn test_locks_exclusive_until_dropped() {
        let locks = AlertLocks::new();
        let id = Uuid::new_v4();

        let guard = locks.try_acquire(id).unwrap();
        assert!(locks.is_held(id));
        assert!(locks.try_acquire(id).is_none());

        drop(guard);
        assert!(!locks.is_held(id));
        assert!(locks.try_acquire(id).is_some());
    }

    #[test]
    fn test_locks_independent_ids() {
        let locks = AlertLocks::new();
        let _a = locks.try_acquire(Uuid::new_v4()).unwrap();
        assert!(locks.try_acquire(Uuid::new_v4()).is_some());
    }

    // -- Cycle outcome tests --

    #[tokio::test]
    async fn test_deals_found_notifies_and_increments() {
        let alert = Alert::sample(); // max_price 200
        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let mut notifier = MockDealNotifier::new();

        pricing.expect_search().times(1).returning(|_| {
            Ok(SearchOutcome::ok(vec![
                quote("a", dec!(180)),
                quote("b", dec!(250)),
                quote("c", dec!(150)),
            ]))
        });
        notifier
            .expect_notify_deals()
            .withf(|_, deals, total| deals.len() == 2 && *total == 2)
            .times(1)
            .returning(|_, _, _| Ok(()));
        store
            .expect_update()
            .withf(|a| a.times_triggered == 1 && a.next_check_at.is_some())
            .times(1)
            .returning(|a| Ok(a.clone()));

        let result = processor(store, pricing, notifier)
            .process(alert, fixed_now())
            .await;

        assert_eq!(result.outcome, CheckOutcome::Notified);
        assert_eq!(result.deals_found, 2);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_source_error_still_reschedules() {
        let alert = Alert::sample();
        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let notifier = MockDealNotifier::new();

        pricing
            .expect_search()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connect timeout")));
        store
            .expect_update()
            .withf(|a| a.times_triggered == 0 && a.last_checked_at.is_some())
            .times(1)
            .returning(|a| Ok(a.clone()));

        let result = processor(store, pricing, notifier)
            .process(alert, fixed_now())
            .await;

        assert_eq!(result.outcome, CheckOutcome::SourceError);
        assert!(result.error.unwrap().contains("connect timeout"));
    }

    #[tokio::test]
    async fn test_source_reported_failure() {
        let alert = Alert::sample();
        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let notifier = MockDealNotifier::new();

        pricing
            .expect_search()
            .times(1)
            .returning(|_| Ok(SearchOutcome::failed("booking: 503")));
        store
            .expect_update()
            .times(1)
            .returning(|a| Ok(a.clone()));

        let result = processor(store, pricing, notifier)
            .process(alert, fixed_now())
            .await;

        assert_eq!(result.outcome, CheckOutcome::SourceError);
        assert_eq!(result.error.as_deref(), Some("booking: 503"));
    }

    #[tokio::test]
    async fn test_no_deals_skips_notifier() {
        let alert = Alert::sample();
        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let notifier = MockDealNotifier::new(); // any call would panic

        pricing
            .expect_search()
            .times(1)
            .returning(|_| Ok(SearchOutcome::ok(vec![quote("pricey", dec!(400))])));
        store
            .expect_update()
            .withf(|a| a.times_triggered == 0 && a.next_check_at.is_some())
            .times(1)
            .returning(|a| Ok(a.clone()));

        let result = processor(store, pricing, notifier)
            .process(alert, fixed_now())
            .await;

        assert_eq!(result.outcome, CheckOutcome::NoDeals);
        assert_eq!(result.deals_found, 0);
    }

    #[tokio::test]
    async fn test_notify_failure_does_not_increment() {
        let alert = Alert::sample();
        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let mut notifier = MockDealNotifier::new();

        pricing
            .expect_search()
            .times(1)
            .returning(|_| Ok(SearchOutcome::ok(vec![quote("a", dec!(120))])));
        notifier
            .expect_notify_deals()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("owner unreachable")));
        store
            .expect_update()
            .withf(|a| a.times_triggered == 0 && a.next_check_at.is_some())
            .times(1)
            .returning(|a| Ok(a.clone()));

        let result = processor(store, pricing, notifier)
            .process(alert, fixed_now())
            .await;

        assert_eq!(result.outcome, CheckOutcome::NotifyFailed);
        assert_eq!(result.deals_found, 1);
    }

    #[tokio::test]
    async fn test_persist_failure_reported() {
        let alert = Alert::sample();
        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let notifier = MockDealNotifier::new();

        pricing
            .expect_search()
            .times(1)
            .returning(|_| Ok(SearchOutcome::ok(vec![])));
        store
            .expect_update()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("database is locked")));

        let result = processor(store, pricing, notifier)
            .process(alert, fixed_now())
            .await;

        assert_eq!(result.outcome, CheckOutcome::PersistError);
        assert!(result.error.unwrap().contains("database is locked"));
    }

    #[tokio::test]
    async fn test_notification_batch_capped() {
        let alert = Alert::sample();
        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let mut notifier = MockDealNotifier::new();

        pricing.expect_search().times(1).returning(|_| {
            let quotes = (0..7).map(|i| quote(&format!("h{i}"), dec!(100))).collect();
            Ok(SearchOutcome::ok(quotes))
        });
        // 7 matches, capped to the default batch of 5.
        notifier
            .expect_notify_deals()
            .withf(|_, deals, total| deals.len() == 5 && *total == 7)
            .times(1)
            .returning(|_, _, _| Ok(()));
        store
            .expect_update()
            .times(1)
            .returning(|a| Ok(a.clone()));

        let result = processor(store, pricing, notifier)
            .process(alert, fixed_now())
            .await;

        assert_eq!(result.outcome, CheckOutcome::Notified);
        assert_eq!(result.deals_found, 7);
    }

    #[tokio::test]
    async fn test_weekly_reschedule_lands_a_week_out() {
        let mut alert = Alert::sample();
        alert.frequency = "weekly".to_string();
        let now = fixed_now(); // 2024-01-01T00:00Z
        let expected = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();

        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let notifier = MockDealNotifier::new();

        pricing
            .expect_search()
            .times(1)
            .returning(|_| Ok(SearchOutcome::ok(vec![])));
        store
            .expect_update()
            .withf(move |a| a.next_check_at == Some(expected) && a.last_checked_at == Some(now))
            .times(1)
            .returning(|a| Ok(a.clone()));

        let result = processor(store, pricing, notifier).process(alert, now).await;
        assert_eq!(result.outcome, CheckOutcome::NoDeals);
    }

    #[tokio::test]
    async fn test_unrecognized_frequency_reschedules_daily() {
        let mut alert = Alert::sample();
        alert.frequency = "biweekly".to_string();
        let now = fixed_now();
        let expected = now + chrono::Duration::days(1);

        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let notifier = MockDealNotifier::new();

        pricing
            .expect_search()
            .times(1)
            .returning(|_| Ok(SearchOutcome::ok(vec![])));
        store
            .expect_update()
            .withf(move |a| a.next_check_at == Some(expected))
            .times(1)
            .returning(|a| Ok(a.clone()));

        let result = processor(store, pricing, notifier).process(alert, now).await;
        assert_eq!(result.outcome, CheckOutcome::NoDeals);
    }

    #[tokio::test]
    async fn test_held_lock_skips_without_side_effects() {
        let alert = Alert::sample();
        // No expectations at all: any store/pricing/notify call would panic.
        let proc = processor(
            MockAlertStore::new(),
            MockPricingSource::new(),
            MockDealNotifier::new(),
        );

        let locks = proc.locks();
        let _guard = locks.try_acquire(alert.id).unwrap();

        let result = proc.process(alert.clone(), fixed_now()).await;
        assert_eq!(result.outcome, CheckOutcome::Skipped);
        assert_eq!(result.deals_found, 0);
    }

    #[tokio::test]
    async fn test_lock_released_after_cycle() {
        let alert = Alert::sample();
        let mut store = MockAlertStore::new();
        let mut pricing = MockPricingSource::new();
        let notifier = MockDealNotifier::new();

        pricing
            .expect_search()
            .times(2)
            .returning(|_| Ok(SearchOutcome::ok(vec![])));
        store
            .expect_update()
            .times(2)
            .returning(|a| Ok(a.clone()));

        let proc = processor(store, pricing, notifier);
        let first = proc.process(alert.clone(), fixed_now()).await;
        assert_eq!(first.outcome, CheckOutcome::NoDeals);
        assert!(!proc.locks().is_held(alert.id));

        // Same outcome on a second pass with identical inputs.
        let second = proc.process(alert, fixed_now()).await;
        assert_eq!(second.outcome, CheckOutcome::NoDeals);
    }
}
