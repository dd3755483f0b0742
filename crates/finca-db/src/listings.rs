//! Listing reconciliation against the `listings` and `listing_details` tables.
//!
//! Incoming search records are folded into the database one at a time by
//! [`reconcile`], which classifies each record and applies exactly the
//! mutations that classification calls for. A full-inventory sweep then
//! retires rows the scan no longer saw via [`mark_inactive_before`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{Row, SqliteConnection};
use std::collections::BTreeMap;

/// Lifecycle state of a property listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Portal-assigned identifier, used verbatim as primary key
    pub property_code: String,
    /// When this listing was first observed
    pub first_seen_at: DateTime<Utc>,
    /// When this listing was last observed by any scan
    pub last_seen_at: DateTime<Utc>,
    /// Publication date reported by the portal, when known
    pub publication_date: Option<NaiveDate>,
    /// Whether the listing is currently on the market
    pub is_active: bool,
    /// Date a deactivation sweep retired this listing
    pub sold_or_withdrawn_at: Option<NaiveDate>,
    /// Whether the listing ever came back after being retired
    pub republished: bool,
    /// When the listing most recently came back
    pub republished_at: Option<DateTime<Utc>>,
}

/// Current price and raw payload for a listing, one row per listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDetails {
    /// Primary key, shared with the `listings` row
    pub property_code: String,
    /// Current asking price in euros
    pub price: i64,
    /// Superseded prices keyed by the date they were replaced
    pub previous_prices: BTreeMap<NaiveDate, i64>,
    /// Most recent search record, stored verbatim
    pub raw_fields: JsonValue,
}

/// How [`reconcile`] classified a search record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// First sighting, listing and details rows created
    New,
    /// Stored price differed from the incoming one
    PriceChange,
    /// Previously retired listing reappeared
    Republished,
    /// Already-known listing seen again, nothing notable
    Active,
    /// Record was unusable and nothing was written
    Skipped,
}

impl ReconcileAction {
    /// Stable snake_case name, as used in logs and job summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::PriceChange => "price_change",
            Self::Republished => "republished",
            Self::Active => "active",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate listing counts for job summaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListingStats {
    /// All listings ever observed
    pub total_listings: i64,
    /// Listings currently on the market
    pub active_listings: i64,
    /// Listings retired by a deactivation sweep
    pub inactive_listings: i64,
    /// Listings that disappeared and later came back
    pub republished_listings: i64,
}

/// Fold one search record into the database.
///
/// The record's `propertyCode` and `price` fields decide what happens:
///
/// * unknown code: listing and details rows are created (`New`)
/// * known code, different stored price: the old price is archived under
///   today's date and replaced (`PriceChange`)
/// * known code, same price, listing retired: the listing is brought back
///   (`Republished`)
/// * otherwise the sighting timestamp advances (`Active`)
///
/// A record with a missing or empty code, or a missing or zero price, is
/// classified `Skipped` and writes nothing. The classifications are
/// mutually exclusive and checked in the order listed, so a record whose
/// price changed while the listing was retired counts as a price change
/// and does not reactivate the listing until a later sighting.
///
/// The caller owns the transaction; this function never commits.
///
/// # Errors
/// Returns `sqlx::Error` if a read or write against the database fails.
pub async fn reconcile(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
    record: &JsonValue,
    publication_date: Option<NaiveDate>,
) -> Result<ReconcileAction, sqlx::Error> {
    let Some(property_code) = extract_property_code(record) else {
        tracing::debug!("Skipping record without property code");
        return Ok(ReconcileAction::Skipped);
    };
    let Some(price) = extract_price(record) else {
        tracing::debug!("Skipping record {} without usable price", property_code);
        return Ok(ReconcileAction::Skipped);
    };

    upsert(conn, now, property_code, price, record, publication_date).await
}

/// Apply the classification for a record already known to carry a usable
/// code and price.
async fn upsert(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
    property_code: &str,
    price: i64,
    record: &JsonValue,
    publication_date: Option<NaiveDate>,
) -> Result<ReconcileAction, sqlx::Error> {
    let listing = get_listing(&mut *conn, property_code).await?;
    let raw_json = serde_json::to_string(record).unwrap_or_default();

    let Some(listing) = listing else {
        sqlx::query(
            "INSERT INTO listings (property_code, first_seen_at, last_seen_at,
                                   publication_date, is_active, republished)
             VALUES (?, ?, ?, ?, 1, 0)",
        )
        .bind(property_code)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(publication_date.map(|d| d.to_string()))
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO listing_details (property_code, price, raw_fields)
             VALUES (?, ?, ?)",
        )
        .bind(property_code)
        .bind(price)
        .bind(&raw_json)
        .execute(&mut *conn)
        .await?;

        tracing::debug!("New listing {} at {}", property_code, price);
        return Ok(ReconcileAction::New);
    };

    let details = get_details(&mut *conn, property_code).await?;

    if let Some(details) = &details {
        if details.price != price {
            let mut previous_prices = details.previous_prices.clone();
            previous_prices.insert(now.date_naive(), details.price);
            let previous_json = serde_json::to_string(&previous_prices).unwrap_or_default();

            sqlx::query(
                "UPDATE listing_details
                 SET price = ?, previous_prices = ?, raw_fields = ?
                 WHERE property_code = ?",
            )
            .bind(price)
            .bind(&previous_json)
            .bind(&raw_json)
            .bind(property_code)
            .execute(&mut *conn)
            .await?;

            sqlx::query("UPDATE listings SET last_seen_at = ? WHERE property_code = ?")
                .bind(now.to_rfc3339())
                .bind(property_code)
                .execute(&mut *conn)
                .await?;

            tracing::debug!(
                "Price change for {}: {} -> {}",
                property_code,
                details.price,
                price
            );
            return Ok(ReconcileAction::PriceChange);
        }
    }

    let action = if listing.is_active {
        sqlx::query("UPDATE listings SET last_seen_at = ? WHERE property_code = ?")
            .bind(now.to_rfc3339())
            .bind(property_code)
            .execute(&mut *conn)
            .await?;

        ReconcileAction::Active
    } else {
        sqlx::query(
            "UPDATE listings
             SET is_active = 1, sold_or_withdrawn_at = NULL,
                 republished = 1, republished_at = ?, last_seen_at = ?
             WHERE property_code = ?",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(property_code)
        .execute(&mut *conn)
        .await?;

        tracing::debug!("Listing {} republished", property_code);
        ReconcileAction::Republished
    };

    if details.is_some() {
        sqlx::query("UPDATE listing_details SET raw_fields = ? WHERE property_code = ?")
            .bind(&raw_json)
            .bind(property_code)
            .execute(&mut *conn)
            .await?;
    }

    Ok(action)
}

/// Retire every active listing last seen strictly before `watermark`.
///
/// Returns the number of listings retired. Used by full-inventory scans,
/// with `watermark` captured before the scan's first network call so
/// listings touched mid-scan keep their active flag.
///
/// # Errors
/// Returns `sqlx::Error` if the database update fails.
pub async fn mark_inactive_before(
    conn: &mut SqliteConnection,
    watermark: DateTime<Utc>,
    deactivated_on: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE listings
         SET is_active = 0, sold_or_withdrawn_at = ?
         WHERE is_active = 1 AND last_seen_at < ?",
    )
    .bind(deactivated_on.to_string())
    .bind(watermark.to_rfc3339())
    .execute(conn)
    .await?;

    let count = result.rows_affected();
    tracing::info!("Deactivated {} listings not seen since watermark", count);
    Ok(count)
}

/// Fetch a listing's lifecycle row.
///
/// # Errors
/// Returns `sqlx::Error` if the database query fails.
pub async fn get_listing(
    conn: &mut SqliteConnection,
    property_code: &str,
) -> Result<Option<Listing>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT property_code, first_seen_at, last_seen_at, publication_date,
                is_active, sold_or_withdrawn_at, republished, republished_at
         FROM listings
         WHERE property_code = ?",
    )
    .bind(property_code)
    .fetch_optional(conn)
    .await?;

    row.map(|row| listing_from_row(&row)).transpose()
}

/// Fetch a listing's price and raw payload row.
///
/// # Errors
/// Returns `sqlx::Error` if the database query fails.
pub async fn get_details(
    conn: &mut SqliteConnection,
    property_code: &str,
) -> Result<Option<ListingDetails>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT property_code, price, previous_prices, raw_fields
         FROM listing_details
         WHERE property_code = ?",
    )
    .bind(property_code)
    .fetch_optional(conn)
    .await?;

    row.map(|row| details_from_row(&row)).transpose()
}

/// Aggregate counts over the `listings` table.
///
/// # Errors
/// Returns `sqlx::Error` if a count query fails.
pub async fn get_statistics(conn: &mut SqliteConnection) -> Result<ListingStats, sqlx::Error> {
    let total_listings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
        .fetch_one(&mut *conn)
        .await?;

    let active_listings: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE is_active = 1")
            .fetch_one(&mut *conn)
            .await?;

    let republished_listings: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE republished = 1")
            .fetch_one(&mut *conn)
            .await?;

    Ok(ListingStats {
        total_listings,
        active_listings,
        inactive_listings: total_listings - active_listings,
        republished_listings,
    })
}

fn extract_property_code(record: &JsonValue) -> Option<&str> {
    record
        .get("propertyCode")
        .and_then(JsonValue::as_str)
        .filter(|code| !code.is_empty())
}

#[allow(clippy::cast_possible_truncation)]
fn extract_price(record: &JsonValue) -> Option<i64> {
    let value = record.get("price")?;
    let price = value
        .as_i64()
        .or_else(|| value.as_f64().map(|price| price as i64))?;
    (price != 0).then_some(price)
}

fn listing_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Listing, sqlx::Error> {
    let first_seen_str: String = row.try_get("first_seen_at")?;
    let first_seen_at = DateTime::parse_from_rfc3339(&first_seen_str)
        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

    let last_seen_str: String = row.try_get("last_seen_at")?;
    let last_seen_at = DateTime::parse_from_rfc3339(&last_seen_str)
        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

    let publication_date: Option<String> = row.try_get("publication_date")?;
    let publication_date =
        publication_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());

    let sold_or_withdrawn_at: Option<String> = row.try_get("sold_or_withdrawn_at")?;
    let sold_or_withdrawn_at =
        sold_or_withdrawn_at.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());

    let republished_at: Option<String> = row.try_get("republished_at")?;
    let republished_at = republished_at.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    });

    let is_active: i64 = row.try_get("is_active")?;
    let republished: i64 = row.try_get("republished")?;

    Ok(Listing {
        property_code: row.try_get("property_code")?,
        first_seen_at,
        last_seen_at,
        publication_date,
        is_active: is_active != 0,
        sold_or_withdrawn_at,
        republished: republished != 0,
        republished_at,
    })
}

fn details_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ListingDetails, sqlx::Error> {
    let previous_prices: Option<String> = row.try_get("previous_prices")?;
    let previous_prices = previous_prices
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();

    let raw_fields_str: String = row.try_get("raw_fields")?;
    let raw_fields = serde_json::from_str(&raw_fields_str).unwrap_or(JsonValue::Null);

    Ok(ListingDetails {
        property_code: row.try_get("property_code")?,
        price: row.try_get("price")?,
        previous_prices,
        raw_fields,
    })
}
