//! Integration tests for `PgDocumentProjection`.
//!
//! These need a PostgreSQL server reachable through `DATABASE_URL`; run them
//! with `cargo test -- --ignored`.

use chrono::{Duration, TimeZone, Utc};
use masail_documents::read_model::{
    DocumentListQuery, DocumentProjectionStore, DocumentRow, SortField, SortOrder,
};
use masail_read_model::PgDocumentProjection;
use sqlx::PgPool;
use uuid::Uuid;

fn make_row(title: &str, minutes: i64) -> DocumentRow {
    let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap() + Duration::minutes(minutes);
    DocumentRow {
        id: Uuid::new_v4(),
        title: title.to_owned(),
        question: "Q".to_owned(),
        answer: "A".to_owned(),
        prolog: Some("Muqaddimah".to_owned()),
        mushoheh: None,
        source_document: None,
        historical_context: None,
        geographical_context: Some("Surabaya".to_owned()),
        publication_date: None,
        madhab_ids: Vec::new(),
        category_ids: Vec::new(),
        is_deleted: false,
        version: 1,
        last_sequence: 1,
        created_at: at,
        updated_at: at,
    }
}

async fn projection(pool: PgPool) -> PgDocumentProjection {
    let store = PgDocumentProjection::new(pool);
    store.ensure_schema().await.unwrap();
    store
}

#[sqlx::test(migrations = false)]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn test_upsert_and_find_round_trip_keeps_tag_order(pool: PgPool) {
    let store = projection(pool).await;
    let mut row = make_row("Hukum Rokok", 0);
    let (m1, m2, m3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    row.madhab_ids = vec![m3, m1, m2];
    row.category_ids = vec![Uuid::new_v4()];

    assert!(store.upsert(&row).await.unwrap());

    let found = store.find(row.id).await.unwrap().unwrap();
    assert_eq!(found, row);
}

#[sqlx::test(migrations = false)]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn test_upsert_ignores_older_versions(pool: PgPool) {
    let store = projection(pool).await;
    let mut newer = make_row("B", 0);
    newer.version = 3;
    newer.madhab_ids = vec![Uuid::new_v4()];
    let mut older = newer.clone();
    older.version = 2;
    older.title = "A".to_owned();
    older.madhab_ids = Vec::new();

    assert!(store.upsert(&newer).await.unwrap());
    assert!(!store.upsert(&older).await.unwrap());

    let found = store.find(newer.id).await.unwrap().unwrap();
    assert_eq!(found.title, "B");
    assert_eq!(found.madhab_ids, newer.madhab_ids);
}

#[sqlx::test(migrations = false)]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn test_list_filters_sorts_and_skips_tombstones(pool: PgPool) {
    let store = projection(pool).await;
    let madhab_id = Uuid::new_v4();
    let mut a = make_row("a", 0);
    a.madhab_ids = vec![madhab_id];
    let mut b = make_row("b", 1);
    b.madhab_ids = vec![madhab_id];
    let mut gone = make_row("c", 2);
    gone.madhab_ids = vec![madhab_id];
    gone.is_deleted = true;
    let other = make_row("d", 3);
    for row in [&a, &b, &gone, &other] {
        store.upsert(row).await.unwrap();
    }

    let by_madhab = store
        .list(&DocumentListQuery {
            madhab_id: Some(madhab_id),
            sort_by: SortField::Title,
            sort_order: SortOrder::Asc,
            ..DocumentListQuery::default()
        })
        .await
        .unwrap();
    let newest = store
        .list(&DocumentListQuery {
            page_size: 1,
            ..DocumentListQuery::default()
        })
        .await
        .unwrap();

    let ids: Vec<Uuid> = by_madhab.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    assert_eq!(by_madhab.total, 2);
    assert_eq!(newest.total, 3);
    assert_eq!(newest.items.len(), 1);
    assert_eq!(newest.items[0].id, other.id);
}

#[sqlx::test(migrations = false)]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn test_checkpoint_defaults_to_zero_and_persists(pool: PgPool) {
    let store = projection(pool).await;

    assert_eq!(store.checkpoint().await.unwrap(), 0);
    store.save_checkpoint(12).await.unwrap();
    store.save_checkpoint(40).await.unwrap();

    assert_eq!(store.checkpoint().await.unwrap(), 40);
}
