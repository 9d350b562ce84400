use calnote_core::db::open_db;
use calnote_core::{
    month_key, Collection, DayEntry, MonthCollection, PersistenceGateway, Settings, SettingsPatch,
    SqliteGateway, StorageErrorKind,
};
use chrono::NaiveDate;
use rusqlite::Connection;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn full_entry() -> DayEntry {
    DayEntry {
        date: date(2024, 3, 4),
        text: "inventory\nsecond line".to_string(),
        symbol: Some("◯".to_string()),
        stamp: Some("star".to_string()),
        time_from: "09:00".to_string(),
        time_to: "17:30".to_string(),
    }
}

#[tokio::test]
async fn never_written_collections_load_empty() {
    let gateway = SqliteGateway::in_memory();

    assert!(gateway.load_entries().await.unwrap().is_empty());
    assert!(gateway.load_settings().await.unwrap().is_none());
    for collection in MonthCollection::ALL {
        assert!(gateway.load_month_values(collection).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn put_entry_round_trips_every_field() {
    let gateway = SqliteGateway::in_memory();
    let entry = full_entry();

    gateway.put_entry(&entry).await.unwrap();

    assert_eq!(gateway.load_entries().await.unwrap(), vec![entry]);
}

#[tokio::test]
async fn put_entry_upserts_by_date() {
    let gateway = SqliteGateway::in_memory();
    let mut entry = full_entry();
    gateway.put_entry(&entry).await.unwrap();

    entry.text = "closed".to_string();
    entry.symbol = None;
    gateway.put_entry(&entry).await.unwrap();

    let loaded = gateway.load_entries().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0], entry);
}

#[tokio::test]
async fn settings_document_round_trips() {
    let gateway = SqliteGateway::in_memory();
    let settings = Settings::default().merged(&SettingsPatch {
        shop_name: Some("Corner Bakery".to_string()),
        background_opacity: Some(0.75),
        ..SettingsPatch::default()
    });

    gateway.put_settings(&settings).await.unwrap();

    let document = gateway.load_settings().await.unwrap().unwrap();
    let decoded: Settings = serde_json::from_value(document).unwrap();
    assert_eq!(decoded, settings);
}

#[tokio::test]
async fn month_values_are_keyed_per_collection() {
    let gateway = SqliteGateway::in_memory();
    let march = month_key(2024, 2);

    gateway
        .put_month_value(MonthCollection::Comments, &march, "stocktake on the 15th")
        .await
        .unwrap();
    gateway
        .put_month_value(MonthCollection::Themes, &march, "sakura")
        .await
        .unwrap();

    let comments = gateway
        .load_month_values(MonthCollection::Comments)
        .await
        .unwrap();
    assert_eq!(
        comments.get("2024-03").map(String::as_str),
        Some("stocktake on the 15th")
    );
    assert!(gateway
        .load_month_values(MonthCollection::GridStyles)
        .await
        .unwrap()
        .is_empty());

    gateway
        .remove_month_value(MonthCollection::Comments, &march)
        .await
        .unwrap();
    gateway
        .remove_month_value(MonthCollection::Comments, &march)
        .await
        .unwrap();
    assert!(gateway
        .load_month_values(MonthCollection::Comments)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        gateway
            .load_month_values(MonthCollection::Themes)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn file_gateway_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calnote.sqlite3");

    let first = SqliteGateway::open_file(&path);
    first.put_entry(&full_entry()).await.unwrap();
    drop(first);

    let second = SqliteGateway::open_file(&path);
    assert_eq!(second.load_entries().await.unwrap(), vec![full_entry()]);
}

#[tokio::test]
async fn undecodable_rows_surface_as_corrupted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("damaged.sqlite3");
    let conn = open_db(&path).unwrap();
    conn.execute_batch(
        "INSERT INTO day_entries (date, text, symbol, stamp, time_from, time_to, updated_at)
         VALUES ('not-a-date', '', NULL, NULL, '', '', 0);
         INSERT INTO settings (key, value, updated_at) VALUES ('settings', '{broken', 0);",
    )
    .unwrap();

    let gateway = SqliteGateway::from_connection(conn);

    let entries_err = gateway.load_entries().await.unwrap_err();
    assert_eq!(entries_err.kind(), StorageErrorKind::Corrupted);
    assert_eq!(entries_err.collection(), Some(Collection::Entries));
    assert!(entries_err.detail().contains("day_entries.date"));
    let settings_err = gateway.load_settings().await.unwrap_err();
    assert_eq!(settings_err.kind(), StorageErrorKind::Corrupted);
    assert!(!settings_err.message().is_empty());
}

#[tokio::test]
async fn newer_schema_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let gateway = SqliteGateway::open_file(&path);
    let err = gateway.load_entries().await.unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::Unavailable);
}
