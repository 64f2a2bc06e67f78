//! SQLite-backed alert store.
//!
//! Alerts live in a single `alerts` table. Timestamps are stored as unix
//! seconds, dates as ISO text, money and ratings as decimal text (never
//! floats), and the amenity list as a JSON array. The frequency label is
//! stored verbatim — an unknown label must load fine and degrade to the
//! daily interval downstream.

use std::str::FromStr;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::AlertStore;
use crate::types::Alert;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS alerts (
    id                 TEXT PRIMARY KEY,
    owner_id           TEXT NOT NULL,
    location           TEXT NOT NULL,
    property_name      TEXT,
    check_in           TEXT NOT NULL,
    check_out          TEXT NOT NULL,
    guests             INTEGER NOT NULL,
    required_amenities TEXT NOT NULL DEFAULT '[]',
    free_cancellation  INTEGER NOT NULL DEFAULT 0,
    max_price          TEXT NOT NULL,
    min_rating         TEXT NOT NULL DEFAULT '0',
    frequency          TEXT NOT NULL,
    last_checked_at    INTEGER,
    next_check_at      INTEGER,
    active             INTEGER NOT NULL DEFAULT 1,
    times_triggered    INTEGER NOT NULL DEFAULT 0,
    created_at         INTEGER NOT NULL,
    updated_at         INTEGER NOT NULL
)
"#;

const DUE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_alerts_due ON alerts (active, next_check_at)";

pub struct SqliteAlertStore {
    pool: SqlitePool,
}

impl SqliteAlertStore {
    /// Open (creating if missing) the database at `url` and ensure the
    /// schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database url: {url}"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {url}"))?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to create alerts table")?;
        sqlx::query(DUE_INDEX)
            .execute(&pool)
            .await
            .context("Failed to create due index")?;

        info!(url, "Alert store ready");
        Ok(Self { pool })
    }
}

// -- Row mapping ------------------------------------------------------------

fn ts_opt(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

fn ts(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .with_context(|| format!("Timestamp out of range: {secs}"))
}

fn date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("Malformed date in store: {text}"))
}

fn decimal(text: &str) -> Result<Decimal> {
    Decimal::from_str(text).with_context(|| format!("Malformed decimal in store: {text}"))
}

fn map_row(row: &SqliteRow) -> Result<Alert> {
    let id: String = row.try_get("id")?;
    let amenities: String = row.try_get("required_amenities")?;
    let check_in: String = row.try_get("check_in")?;
    let check_out: String = row.try_get("check_out")?;
    let max_price: String = row.try_get("max_price")?;
    let min_rating: String = row.try_get("min_rating")?;
    let guests: i64 = row.try_get("guests")?;
    let times_triggered: i64 = row.try_get("times_triggered")?;

    Ok(Alert {
        id: Uuid::parse_str(&id).with_context(|| format!("Malformed alert id: {id}"))?,
        owner_id: row.try_get("owner_id")?,
        location: row.try_get("location")?,
        property_name: row.try_get("property_name")?,
        check_in: date(&check_in)?,
        check_out: date(&check_out)?,
        guests: guests as u32,
        required_amenities: serde_json::from_str(&amenities)
            .context("Malformed amenity list in store")?,
        free_cancellation: row.try_get("free_cancellation")?,
        max_price: decimal(&max_price)?,
        min_rating: decimal(&min_rating)?,
        frequency: row.try_get("frequency")?,
        last_checked_at: ts_opt(row.try_get("last_checked_at")?),
        next_check_at: ts_opt(row.try_get("next_check_at")?),
        active: row.try_get("active")?,
        times_triggered: times_triggered as u64,
        created_at: ts(row.try_get("created_at")?)?,
        updated_at: ts(row.try_get("updated_at")?)?,
    })
}

#[async_trait]
impl AlertStore for SqliteAlertStore {
    async fn get_due_alerts(&self, now: DateTime<Utc>) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            "SELECT * FROM alerts \
             WHERE active = 1 AND (next_check_at IS NULL OR next_check_at <= ?) \
             ORDER BY COALESCE(next_check_at, 0)",
        )
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await
        .context("Due-alerts query failed")?;

        let alerts = rows.iter().map(map_row).collect::<Result<Vec<_>>>()?;
        debug!(due = alerts.len(), "Due alerts fetched");
        Ok(alerts)
    }

    async fn update(&self, alert: &Alert) -> Result<Alert> {
        let updated_at = Utc::now();
        let result = sqlx::query(
            "UPDATE alerts SET \
                owner_id = ?, location = ?, property_name = ?, check_in = ?, \
                check_out = ?, guests = ?, required_amenities = ?, \
                free_cancellation = ?, max_price = ?, min_rating = ?, \
                frequency = ?, last_checked_at = ?, next_check_at = ?, \
                active = ?, times_triggered = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&alert.owner_id)
        .bind(&alert.location)
        .bind(&alert.property_name)
        .bind(alert.check_in.to_string())
        .bind(alert.check_out.to_string())
        .bind(alert.guests as i64)
        .bind(serde_json::to_string(&alert.required_amenities)?)
        .bind(alert.free_cancellation)
        .bind(alert.max_price.to_string())
        .bind(alert.min_rating.to_string())
        .bind(&alert.frequency)
        .bind(alert.last_checked_at.map(|t| t.timestamp()))
        .bind(alert.next_check_at.map(|t| t.timestamp()))
        .bind(alert.active)
        .bind(alert.times_triggered as i64)
        .bind(updated_at.timestamp())
        .bind(alert.id.to_string())
        .execute(&self.pool)
        .await
        .context("Alert update failed")?;

        if result.rows_affected() == 0 {
            bail!("Alert {} no longer exists", alert.id);
        }

        let mut updated = alert.clone();
        updated.updated_at = updated_at;
        Ok(updated)
    }

    async fn insert(&self, alert: &Alert) -> Result<Alert> {
        alert.validate()?;

        sqlx::query(
            "INSERT INTO alerts ( \
                id, owner_id, location, property_name, check_in, check_out, \
                guests, required_amenities, free_cancellation, max_price, \
                min_rating, frequency, last_checked_at, next_check_at, active, \
                times_triggered, created_at, updated_at \
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(alert.id.to_string())
        .bind(&alert.owner_id)
        .bind(&alert.location)
        .bind(&alert.property_name)
        .bind(alert.check_in.to_string())
        .bind(alert.check_out.to_string())
        .bind(alert.guests as i64)
        .bind(serde_json::to_string(&alert.required_amenities)?)
        .bind(alert.free_cancellation)
        .bind(alert.max_price.to_string())
        .bind(alert.min_rating.to_string())
        .bind(&alert.frequency)
        .bind(alert.last_checked_at.map(|t| t.timestamp()))
        .bind(alert.next_check_at.map(|t| t.timestamp()))
        .bind(alert.active)
        .bind(alert.times_triggered as i64)
        .bind(alert.created_at.timestamp())
        .bind(alert.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Alert insert failed")?;

        debug!(alert_id = %alert.id, owner_id = %alert.owner_id, "Alert created");
        Ok(alert.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Alert lookup failed")?;

        row.as_ref().map(map_row).transpose()
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            "SELECT * FROM alerts WHERE owner_id = ? ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .context("Owner alert listing failed")?;

        rows.iter().map(map_row).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Alert delete failed")?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Alert> {
        let mut alert = match self.get(id).await? {
            Some(alert) => alert,
            None => bail!("Alert {id} no longer exists"),
        };

        alert.active = active;
        if active {
            // A resumed alert is due immediately.
            alert.next_check_at = Some(Utc::now());
        }

        self.update(&alert).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
