//! Alert persistence.
//!
//! Defines the `AlertStore` trait the engine depends on and provides the
//! SQLite implementation used in production. The engine only ever needs the
//! due-alerts query and the single write-back per cycle; the remaining CRUD
//! serves the command layer that owns alert creation and editing.

pub mod sqlite;

pub use sqlite::SqliteAlertStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::Alert;

/// Abstraction over durable alert storage.
///
/// Implementations must provide read-after-write consistency within one
/// process: an `update` is visible to the next `get_due_alerts` call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Active alerts whose `next_check_at` is null or `<= now`.
    async fn get_due_alerts(&self, now: DateTime<Utc>) -> Result<Vec<Alert>>;

    /// Persist an alert's mutated fields and stamp `updated_at`.
    /// Fails if the alert no longer exists.
    async fn update(&self, alert: &Alert) -> Result<Alert>;

    /// Persist a new alert after validating its criteria.
    async fn insert(&self, alert: &Alert) -> Result<Alert>;

    /// Fetch a single alert by id.
    async fn get(&self, id: Uuid) -> Result<Option<Alert>>;

    /// All alerts belonging to one owner, newest first.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Alert>>;

    /// Remove an alert. Returns whether a row was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Pause or resume an alert. Resuming makes it due immediately.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<Alert>;
}
