use crate::Database;
use chrono::{Duration, TimeZone, Utc};
use signalpost_core::{
    ContentDraft, ContentType, CoreError, DraftRef, DraftStore, Sentiment, StoreError,
    TopicCategory, TrendTopic,
};
use std::env;

async fn setup_test_db() -> Database {
    let db_path = env::temp_dir().join(format!("test_signalpost_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let mut db = Database::new(db_url);
    db.connect()
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    db
}

fn draft(keyword: Option<&str>, text: &str) -> ContentDraft {
    ContentDraft {
        text: text.to_string(),
        target_length: 280,
        source_topic: keyword.map(|k| {
            TrendTopic::new(k, 10.0, Sentiment::Positive, TopicCategory::Crypto, 72.5)
        }),
        content_type: ContentType::Post,
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let db = setup_test_db().await;
    db.run_migrations().await.expect("Second migration run failed");
    assert!(db.unused_drafts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_and_read_back() {
    let db = setup_test_db().await;
    let draft_ref = db.save_draft(&draft(Some("Bitcoin"), "BTC looks strong")).await.unwrap();

    let stored = db.get_draft(&draft_ref).await.unwrap();
    assert_eq!(stored.text, "BTC looks strong");
    assert_eq!(stored.content_type, ContentType::Post);
    assert_eq!(stored.target_length, 280);
    assert_eq!(stored.source_keyword.as_deref(), Some("bitcoin"));
    assert_eq!(stored.relevance_score, Some(72.5));
    assert!(stored.scheduled_for.is_none());
    assert!(stored.used_at.is_none());
}

#[tokio::test]
async fn test_schedule_and_mark_used() {
    let db = setup_test_db().await;
    let later = db.save_draft(&draft(None, "later")).await.unwrap();
    let sooner = db.save_draft(&draft(None, "sooner")).await.unwrap();
    let loose = db.save_draft(&draft(None, "loose")).await.unwrap();
    let posted = db.save_draft(&draft(None, "posted")).await.unwrap();

    let base = Utc.with_ymd_and_hms(2026, 10, 20, 9, 30, 0).unwrap();
    db.schedule_draft(&later, base + Duration::hours(4)).await.unwrap();
    db.schedule_draft(&sooner, base).await.unwrap();
    db.mark_draft_used(&posted).await.unwrap();

    assert_eq!(db.get_draft(&sooner).await.unwrap().scheduled_for, Some(base));
    assert!(db.get_draft(&posted).await.unwrap().used_at.is_some());

    let unused: Vec<DraftRef> = db
        .unused_drafts()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.draft_ref)
        .collect();
    assert_eq!(unused, vec![sooner, later, loose]);
}

#[tokio::test]
async fn test_unknown_draft() {
    let db = setup_test_db().await;
    let missing = DraftRef("missing".to_string());

    assert!(matches!(
        db.get_draft(&missing).await,
        Err(CoreError::Store(StoreError::DraftNotFound { .. }))
    ));
    assert!(matches!(
        db.mark_draft_used(&missing).await,
        Err(CoreError::Store(StoreError::DraftNotFound { .. }))
    ));
}

#[tokio::test]
async fn test_queries_before_connect_fail() {
    let db = Database::new("sqlite::memory:".to_string());
    assert!(matches!(
        db.save_draft(&draft(None, "x")).await,
        Err(CoreError::Store(StoreError::ConnectionFailed { .. }))
    ));
}
