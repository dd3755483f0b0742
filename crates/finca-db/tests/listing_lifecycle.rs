//! End-to-end lifecycle checks spanning several simulated scans.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value as JsonValue;
use tempfile::TempDir;

use finca_db::api_requests::{self, RequestLog};
use finca_db::listings::{self, ReconcileAction};
use finca_db::Database;

async fn setup_db() -> (TempDir, Database) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("finca.db");
    let db = Database::new(path.to_str().expect("utf-8 path"))
        .await
        .expect("open test db");
    db.run_migrations().await.expect("apply migrations");
    (dir, db)
}

fn ts(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec).unwrap()
}

fn record(code: &str, price: i64) -> JsonValue {
    serde_json::json!({
        "propertyCode": code,
        "price": price,
        "propertyType": "flat",
        "municipality": "Toledo"
    })
}

#[tokio::test]
async fn listing_survives_a_full_market_cycle() {
    let (_dir, db) = setup_db().await;
    let mut conn = db.pool().acquire().await.expect("acquire");

    // Day 2: first sighting in a daily scan.
    let first_seen = ts(2026, 3, 2, 6, 0, 0);
    let action = listings::reconcile(&mut conn, first_seen, &record("77", 250_000), None)
        .await
        .expect("day 2");
    assert_eq!(action, ReconcileAction::New);

    // Day 3: seen again, unchanged.
    let action = listings::reconcile(&mut conn, ts(2026, 3, 3, 6, 0, 0), &record("77", 250_000), None)
        .await
        .expect("day 3");
    assert_eq!(action, ReconcileAction::Active);

    // Day 6: the seller drops the price.
    let drop_day = ts(2026, 3, 6, 6, 0, 0);
    let action = listings::reconcile(&mut conn, drop_day, &record("77", 235_000), None)
        .await
        .expect("day 6");
    assert_eq!(action, ReconcileAction::PriceChange);

    // Day 21: a weekly full scan does not see the listing, so the
    // deactivation sweep retires it.
    let watermark = ts(2026, 3, 21, 3, 0, 0);
    let retired = listings::mark_inactive_before(&mut conn, watermark, watermark.date_naive())
        .await
        .expect("sweep");
    assert_eq!(retired, 1);

    let listing = listings::get_listing(&mut conn, "77")
        .await
        .expect("get")
        .expect("exists");
    assert!(!listing.is_active);
    assert_eq!(listing.sold_or_withdrawn_at, Some(watermark.date_naive()));

    // Day 30: the listing reappears at the dropped price.
    let comeback = ts(2026, 3, 30, 6, 0, 0);
    let action = listings::reconcile(&mut conn, comeback, &record("77", 235_000), None)
        .await
        .expect("day 30");
    assert_eq!(action, ReconcileAction::Republished);

    // History survives the round trip.
    let listing = listings::get_listing(&mut conn, "77")
        .await
        .expect("get")
        .expect("exists");
    assert!(listing.is_active);
    assert!(listing.republished);
    assert_eq!(listing.republished_at, Some(comeback));
    assert_eq!(listing.first_seen_at, first_seen);
    assert!(listing.sold_or_withdrawn_at.is_none());

    let details = listings::get_details(&mut conn, "77")
        .await
        .expect("get details")
        .expect("exists");
    assert_eq!(details.price, 235_000);
    assert_eq!(
        details.previous_prices.get(&drop_day.date_naive()),
        Some(&250_000)
    );

    let stats = listings::get_statistics(&mut conn).await.expect("stats");
    assert_eq!(stats.total_listings, 1);
    assert_eq!(stats.active_listings, 1);
    assert_eq!(stats.inactive_listings, 0);
    assert_eq!(stats.republished_listings, 1);
}

#[tokio::test]
async fn sweep_watermark_spares_listings_seen_mid_scan() {
    let (_dir, db) = setup_db().await;

    // A listing from an earlier scan that the upcoming sweep should retire.
    {
        let mut conn = db.pool().acquire().await.expect("acquire");
        listings::reconcile(&mut conn, ts(2026, 3, 10, 6, 0, 0), &record("old", 90_000), None)
            .await
            .expect("seed stale listing");
    }

    // Watermark is captured before the scan touches the network. Records
    // processed afterwards carry later timestamps.
    let watermark = ts(2026, 3, 21, 3, 0, 0);

    let mut tx = db.pool().begin().await.expect("begin page tx");
    listings::reconcile(
        &mut tx,
        ts(2026, 3, 21, 3, 0, 30),
        &record("fresh", 120_000),
        None,
    )
    .await
    .expect("reconcile mid-scan record");
    tx.commit().await.expect("commit page");

    let mut tx = db.pool().begin().await.expect("begin sweep tx");
    let retired = listings::mark_inactive_before(&mut tx, watermark, watermark.date_naive())
        .await
        .expect("sweep");
    tx.commit().await.expect("commit sweep");
    assert_eq!(retired, 1);

    let mut conn = db.pool().acquire().await.expect("acquire");
    let stale = listings::get_listing(&mut conn, "old")
        .await
        .expect("get")
        .expect("exists");
    assert!(!stale.is_active);

    let fresh = listings::get_listing(&mut conn, "fresh")
        .await
        .expect("get")
        .expect("exists");
    assert!(fresh.is_active, "mid-scan sighting must survive the sweep");
}

#[tokio::test]
async fn rolled_back_page_leaves_no_trace() {
    let (_dir, db) = setup_db().await;
    let job_id = "weekly-20260321-030000";
    let page_params = serde_json::json!({ "numPage": 2, "maxItems": 50 });

    // Page 1 commits normally, ledger entry included.
    let mut tx = db.pool().begin().await.expect("begin page 1");
    listings::reconcile(&mut tx, ts(2026, 3, 21, 3, 0, 10), &record("a", 100_000), None)
        .await
        .expect("page 1 record");
    api_requests::create_api_request(
        &mut tx,
        ts(2026, 3, 21, 3, 0, 10),
        RequestLog {
            request_type: "search",
            endpoint: "/3.5/es/search",
            status_code: Some(200),
            job_id: Some(job_id),
            ..RequestLog::default()
        },
    )
    .await
    .expect("page 1 ledger");
    tx.commit().await.expect("commit page 1");

    // Page 2 fails partway through and rolls back.
    let mut tx = db.pool().begin().await.expect("begin page 2");
    listings::reconcile(&mut tx, ts(2026, 3, 21, 3, 0, 20), &record("b", 200_000), None)
        .await
        .expect("page 2 record");
    api_requests::create_api_request(
        &mut tx,
        ts(2026, 3, 21, 3, 0, 20),
        RequestLog {
            request_type: "search",
            endpoint: "/3.5/es/search",
            status_code: Some(200),
            job_id: Some(job_id),
            ..RequestLog::default()
        },
    )
    .await
    .expect("page 2 ledger");
    tx.rollback().await.expect("rollback page 2");

    let mut conn = db.pool().acquire().await.expect("acquire");
    assert!(listings::get_listing(&mut conn, "a")
        .await
        .expect("get")
        .is_some());
    assert!(listings::get_listing(&mut conn, "b")
        .await
        .expect("get")
        .is_none());

    let ledger = api_requests::get_by_job(&mut conn, job_id)
        .await
        .expect("ledger");
    assert_eq!(ledger.len(), 1, "only the committed page is ledgered");
}

#[tokio::test]
async fn same_price_on_active_listing_never_touches_history() {
    let (_dir, db) = setup_db().await;
    let mut conn = db.pool().acquire().await.expect("acquire");

    listings::reconcile(&mut conn, ts(2026, 4, 1, 6, 0, 0), &record("55", 300_000), None)
        .await
        .expect("create");
    listings::reconcile(&mut conn, ts(2026, 4, 2, 6, 0, 0), &record("55", 280_000), None)
        .await
        .expect("price change");

    for day in 3..=6 {
        let action = listings::reconcile(
            &mut conn,
            ts(2026, 4, day, 6, 0, 0),
            &record("55", 280_000),
            None,
        )
        .await
        .expect("steady sighting");
        assert_eq!(action, ReconcileAction::Active);
    }

    let details = listings::get_details(&mut conn, "55")
        .await
        .expect("get details")
        .expect("exists");
    assert_eq!(details.previous_prices.len(), 1);
    assert_eq!(
        details.previous_prices.get(&NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()),
        Some(&300_000)
    );
}
