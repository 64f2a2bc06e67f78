//! Next-check scheduling.
//!
//! Maps an alert's frequency label to the timestamp of its next check.
//! Pure and deterministic — the single place the frequency table lives.

use chrono::{DateTime, Utc};

use crate::types::Frequency;

/// Compute when an alert checked at `now` should be checked next.
///
/// Unrecognized labels fail closed to the daily interval rather than
/// erroring, so an alert can never be left permanently un-rescheduled.
/// Callers that care should log when `frequency` does not parse.
pub fn next_check_after(frequency: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let interval = frequency
        .parse::<Frequency>()
        .map(|f| f.interval())
        .unwrap_or_else(|_| Frequency::Daily.interval());

    now + interval
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
