//! Integration tests for SqliteStore
//!
//! Tests cover:
//! - Document round trips and store-controlled timestamps
//! - Listing order for documents and assets
//! - Conversation entry ordering, artifacts, and clearing
//! - Asset CRUD

use anyhow::Result;
use chrono::{Duration, Utc};
use inkdeck_core::db::{DatabaseService, DocumentStore, SqliteStore};
use inkdeck_core::models::time::{MockTimeProvider, TimeProvider};
use inkdeck_core::models::{Asset, ConversationEntry, Document, Role, DEFAULT_THEME};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

/// Test helper: Create a store over a fresh database file
async fn create_test_env() -> Result<(SqliteStore, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(DatabaseService::open(db_path).await?);
    Ok((SqliteStore::new(db), temp_dir))
}

/// Test helper: Create a store with a controllable clock
async fn create_test_env_with_clock() -> Result<(SqliteStore, Arc<MockTimeProvider>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(DatabaseService::open(db_path).await?);
    let clock = Arc::new(MockTimeProvider::with_time(Utc::now()));
    let time: Arc<dyn TimeProvider> = clock.clone();
    let store = SqliteStore::with_time_provider(db, time);
    Ok((store, clock, temp_dir))
}

// =========================================================================
// Document Tests
// =========================================================================

#[tokio::test]
async fn test_document_round_trip() -> Result<()> {
    let (store, _temp_dir) = create_test_env().await?;

    let doc = Document::new("Quarterly review", "# Slide 1");
    let written = store.put_document(doc.clone()).await?;

    let fetched = store.get_document(&doc.id).await?.expect("document exists");
    assert_eq!(fetched.id, doc.id);
    assert_eq!(fetched.title, "Quarterly review");
    assert_eq!(fetched.content, "# Slide 1");
    assert_eq!(fetched.selected_theme, DEFAULT_THEME);
    assert_eq!(fetched.custom_css, "");
    assert_eq!(fetched.updated_at, written.updated_at);

    Ok(())
}

#[tokio::test]
async fn test_get_missing_document_is_none() -> Result<()> {
    let (store, _temp_dir) = create_test_env().await?;
    assert!(store.get_document("no-such-id").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_put_document_refreshes_updated_at() -> Result<()> {
    let (store, clock, _temp_dir) = create_test_env_with_clock().await?;

    let doc = Document::new("Doc", "v1");
    let first = store.put_document(doc).await?;

    clock.advance(Duration::seconds(30));

    let mut edited = first.clone();
    edited.content = "v2".to_string();
    let second = store.put_document(edited).await?;

    assert_eq!(second.updated_at - first.updated_at, Duration::seconds(30));

    // The caller-supplied updated_at is ignored entirely
    let mut stale = second.clone();
    stale.updated_at = first.updated_at - Duration::hours(1);
    clock.advance(Duration::seconds(5));
    let third = store.put_document(stale).await?;
    assert!(third.updated_at > second.updated_at);

    Ok(())
}

#[tokio::test]
async fn test_upsert_preserves_created_at() -> Result<()> {
    let (store, clock, _temp_dir) = create_test_env_with_clock().await?;

    let doc = Document::new("Doc", "v1");
    store.put_document(doc.clone()).await?;

    clock.advance(Duration::minutes(10));

    let mut edited = doc.clone();
    edited.content = "v2".to_string();
    // Even a tampered created_at does not overwrite the original row value
    edited.created_at = Utc::now() + Duration::days(1);
    store.put_document(edited).await?;

    let fetched = store.get_document(&doc.id).await?.expect("document exists");
    assert_eq!(
        fetched.created_at.timestamp(),
        doc.created_at.timestamp(),
        "created_at must survive upserts"
    );
    assert_eq!(fetched.content, "v2");

    Ok(())
}

#[tokio::test]
async fn test_put_document_rejects_blank_title() -> Result<()> {
    let (store, _temp_dir) = create_test_env().await?;

    let mut doc = Document::new("ok", "body");
    doc.title = "   ".to_string();
    assert!(store.put_document(doc).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_list_documents_most_recent_first() -> Result<()> {
    let (store, clock, _temp_dir) = create_test_env_with_clock().await?;

    let a = store.put_document(Document::new("A", "")).await?;
    clock.advance(Duration::seconds(1));
    let b = store.put_document(Document::new("B", "")).await?;
    clock.advance(Duration::seconds(1));
    store.put_document(a.clone()).await?; // touch A

    let listed = store.list_documents().await?;
    let ids: Vec<&str> = listed.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec![a.id.as_str(), b.id.as_str()]);

    Ok(())
}

#[tokio::test]
async fn test_delete_document_reports_absence() -> Result<()> {
    let (store, _temp_dir) = create_test_env().await?;

    let doc = store.put_document(Document::new("Doc", "")).await?;
    assert!(store.delete_document(&doc.id).await?);
    assert!(!store.delete_document(&doc.id).await?);
    assert!(store.get_document(&doc.id).await?.is_none());

    Ok(())
}

// =========================================================================
// Conversation Entry Tests
// =========================================================================

#[tokio::test]
async fn test_entries_ordered_by_timestamp() -> Result<()> {
    let (store, _temp_dir) = create_test_env().await?;

    let doc = store.put_document(Document::new("Doc", "")).await?;

    let base = Utc::now();
    for (offset, text) in [(2, "third"), (0, "first"), (1, "second")] {
        let mut entry = ConversationEntry::new(&doc.id, Role::User, text, None);
        entry.timestamp = base + Duration::seconds(offset);
        store.put_entry(entry).await?;
    }

    let entries = store.list_entries(&doc.id).await?;
    let texts: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);

    Ok(())
}

#[tokio::test]
async fn test_entry_artifacts_round_trip() -> Result<()> {
    let (store, _temp_dir) = create_test_env().await?;

    let doc = store.put_document(Document::new("Doc", "")).await?;
    let entry = ConversationEntry::new(
        &doc.id,
        Role::Assistant,
        "Here is a draft",
        Some(json!({"slides": ["# Intro", "# Detail"], "rev": 3})),
    );
    store.put_entry(entry.clone()).await?;

    let entries = store.list_entries(&doc.id).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].role, Role::Assistant);
    let artifacts = entries[0].artifacts.as_ref().expect("artifacts survive");
    assert_eq!(artifacts["slides"][1], "# Detail");
    assert_eq!(artifacts["rev"], 3);

    // Entries without artifacts stay None rather than becoming null
    let bare = ConversationEntry::new(&doc.id, Role::User, "thanks", None);
    store.put_entry(bare).await?;
    let entries = store.list_entries(&doc.id).await?;
    assert!(entries[1].artifacts.is_none());

    Ok(())
}

#[tokio::test]
async fn test_clear_entries_counts_and_scopes() -> Result<()> {
    let (store, _temp_dir) = create_test_env().await?;

    let doc_a = store.put_document(Document::new("A", "")).await?;
    let doc_b = store.put_document(Document::new("B", "")).await?;

    for _ in 0..3 {
        store
            .put_entry(ConversationEntry::new(&doc_a.id, Role::User, "hi", None))
            .await?;
    }
    store
        .put_entry(ConversationEntry::new(&doc_b.id, Role::User, "yo", None))
        .await?;

    assert_eq!(store.clear_entries(&doc_a.id).await?, 3);
    assert!(store.list_entries(&doc_a.id).await?.is_empty());
    assert_eq!(store.list_entries(&doc_b.id).await?.len(), 1);

    // Clearing again is a harmless no-op
    assert_eq!(store.clear_entries(&doc_a.id).await?, 0);

    Ok(())
}

// =========================================================================
// Asset Tests
// =========================================================================

#[tokio::test]
async fn test_asset_round_trip_and_delete() -> Result<()> {
    let (store, _temp_dir) = create_test_env().await?;

    let asset = Asset::new("logo.png", "data:image/png;base64,AAAA");
    store.put_asset(asset.clone()).await?;

    let fetched = store.get_asset(&asset.id).await?.expect("asset exists");
    assert_eq!(fetched.name, "logo.png");
    assert_eq!(fetched.binary_content, "data:image/png;base64,AAAA");

    assert!(store.delete_asset(&asset.id).await?);
    assert!(!store.delete_asset(&asset.id).await?);
    assert!(store.get_asset(&asset.id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_list_assets_newest_first() -> Result<()> {
    let (store, _temp_dir) = create_test_env().await?;

    let base = Utc::now();
    let mut ids = Vec::new();
    for i in 0..3 {
        let mut asset = Asset::new(format!("a{}.png", i), "data:;base64,");
        asset.created_at = base + Duration::seconds(i);
        ids.push(asset.id.clone());
        store.put_asset(asset).await?;
    }

    let listed = store.list_assets().await?;
    let listed_ids: Vec<&str> = listed.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(
        listed_ids,
        vec![ids[2].as_str(), ids[1].as_str(), ids[0].as_str()]
    );

    Ok(())
}
