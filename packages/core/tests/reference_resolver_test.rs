//! Integration tests for ReferenceResolver
//!
//! Tests cover:
//! - Token rewriting against a real store
//! - Miss markers and graceful degradation
//! - Cache fills, explicit invalidation, and concurrent de-duplication

use anyhow::Result;
use async_trait::async_trait;
use inkdeck_core::db::{CascadeOutcome, CascadePolicy, DatabaseService, DocumentStore, SqliteStore, StoreError};
use inkdeck_core::models::{Asset, ConversationEntry, Document};
use inkdeck_core::services::{ReferenceResolver, ResolverConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Test helper: Create a resolver over a fresh store
async fn create_test_env() -> Result<(Arc<dyn DocumentStore>, ReferenceResolver, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(DatabaseService::open(db_path).await?);
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(db));
    let resolver = ReferenceResolver::new(Arc::clone(&store), ResolverConfig::default());
    Ok((store, resolver, temp_dir))
}

/// Store double that counts asset fetches and answers them slowly, so
/// concurrent resolves overlap long enough to expose duplicate reads.
struct FetchCountingStore {
    asset: Asset,
    fetches: AtomicUsize,
}

impl FetchCountingStore {
    fn holding(asset: Asset) -> Self {
        Self {
            asset,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for FetchCountingStore {
    async fn get_document(&self, _id: &str) -> Result<Option<Document>, StoreError> {
        Ok(None)
    }

    async fn put_document(&self, doc: Document) -> Result<Document, StoreError> {
        Ok(doc)
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        Ok(Vec::new())
    }

    async fn delete_document(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn delete_document_cascade(
        &self,
        _id: &str,
        _policy: CascadePolicy,
    ) -> Result<CascadeOutcome, StoreError> {
        Ok(CascadeOutcome::default())
    }

    async fn put_entry(&self, entry: ConversationEntry) -> Result<ConversationEntry, StoreError> {
        Ok(entry)
    }

    async fn list_entries(
        &self,
        _document_id: &str,
    ) -> Result<Vec<ConversationEntry>, StoreError> {
        Ok(Vec::new())
    }

    async fn clear_entries(&self, _document_id: &str) -> Result<u64, StoreError> {
        Ok(0)
    }

    async fn put_asset(&self, asset: Asset) -> Result<Asset, StoreError> {
        Ok(asset)
    }

    async fn get_asset(&self, id: &str) -> Result<Option<Asset>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        if id == self.asset.id {
            Ok(Some(self.asset.clone()))
        } else {
            Ok(None)
        }
    }

    async fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        Ok(Vec::new())
    }

    async fn delete_asset(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_resolve_rewrites_known_tokens() -> Result<()> {
    let (store, resolver, _temp_dir) = create_test_env().await?;

    let asset = Asset::new("logo.png", "data:image/png;base64,AAAA");
    store.put_asset(asset.clone()).await?;

    let content = format!("# Slide 1\n\n![logo](asset://{})\n", asset.id);
    let resolved = resolver.resolve(&content).await;

    assert_eq!(resolved, "# Slide 1\n\n![logo](data:image/png;base64,AAAA)\n");
    Ok(())
}

#[tokio::test]
async fn test_resolve_leaves_unknown_tokens_unchanged() -> Result<()> {
    let (store, resolver, _temp_dir) = create_test_env().await?;

    let asset = Asset::new("ok.png", "data:;base64,OK");
    store.put_asset(asset.clone()).await?;

    let content = format!(
        "![good](asset://{}) and ![gone](asset://no-such-asset)",
        asset.id
    );
    let resolved = resolver.resolve(&content).await;

    assert!(resolved.contains("![good](data:;base64,OK)"));
    assert!(resolved.contains("![gone](asset://no-such-asset)"));
    Ok(())
}

#[tokio::test]
async fn test_resolve_without_tokens_is_identity() -> Result<()> {
    let (_store, resolver, _temp_dir) = create_test_env().await?;

    let content = "# Plain slide\n\n![web pic](https://example.com/p.png)";
    assert_eq!(resolver.resolve(content).await, content);
    assert_eq!(resolver.cached_len().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_tokens_fill_one_cache_entry() -> Result<()> {
    let (store, resolver, _temp_dir) = create_test_env().await?;

    let asset = Asset::new("logo.png", "data:;base64,X");
    store.put_asset(asset.clone()).await?;

    let content = format!(
        "![a](asset://{id}) ![b](asset://{id}) ![c](asset://{id})",
        id = asset.id
    );
    let resolved = resolver.resolve(&content).await;

    assert_eq!(resolved.matches("data:;base64,X").count(), 3);
    assert_eq!(resolver.cached_len().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_resolves_share_the_cache() -> Result<()> {
    let (store, resolver, _temp_dir) = create_test_env().await?;
    let resolver = Arc::new(resolver);

    let asset = Asset::new("shared.png", "data:;base64,S");
    store.put_asset(asset.clone()).await?;
    let content = format!("![s](asset://{})", asset.id);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let resolver = Arc::clone(&resolver);
        let content = content.clone();
        handles.push(tokio::spawn(async move { resolver.resolve(&content).await }));
    }
    for handle in handles {
        let resolved = handle.await?;
        assert!(resolved.contains("data:;base64,S"));
    }

    assert_eq!(resolver.cached_len().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_resolves_fetch_each_id_once() -> Result<()> {
    let asset = Asset::new("hot.png", "data:;base64,HOT");
    let store = Arc::new(FetchCountingStore::holding(asset.clone()));
    let resolver = Arc::new(ReferenceResolver::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        ResolverConfig::default(),
    ));
    let content = format!("![h](asset://{})", asset.id);

    // All callers race on the same uncached id while the fetch is slow
    let mut handles = Vec::new();
    for _ in 0..8 {
        let resolver = Arc::clone(&resolver);
        let content = content.clone();
        handles.push(tokio::spawn(async move { resolver.resolve(&content).await }));
    }
    for handle in handles {
        assert!(handle.await?.contains("data:;base64,HOT"));
    }

    assert_eq!(
        store.fetches.load(Ordering::SeqCst),
        1,
        "exactly one store read per id across concurrent resolves"
    );
    Ok(())
}

#[tokio::test]
async fn test_referenced_ids_collapses_duplicates() -> Result<()> {
    let (_store, resolver, _temp_dir) = create_test_env().await?;

    let ids = resolver.referenced_ids(
        "![a](asset://one) ![b](asset://two) ![c](asset://one) [x](asset://three)",
    );

    assert_eq!(ids.len(), 2);
    assert!(ids.contains("one"));
    assert!(ids.contains("two"));
    Ok(())
}

#[tokio::test]
async fn test_miss_marker_is_cached_and_invalidation_refetches() -> Result<()> {
    let (store, resolver, _temp_dir) = create_test_env().await?;

    let id = "late-arrival";
    let content = format!("![pic](asset://{})", id);

    // First resolve caches the miss
    let resolved = resolver.resolve(&content).await;
    assert_eq!(resolved, content);
    assert_eq!(resolver.cached_len().await, 1);

    // The asset shows up later; the cached miss still wins until
    // explicitly invalidated
    let mut asset = Asset::new("pic.png", "data:;base64,LATE");
    asset.id = id.to_string();
    store.put_asset(asset).await?;
    assert_eq!(resolver.resolve(&content).await, content);

    resolver.invalidate(id).await;
    let resolved = resolver.resolve(&content).await;
    assert_eq!(resolved, "![pic](data:;base64,LATE)");
    Ok(())
}

#[tokio::test]
async fn test_update_primes_cache_without_store_read() -> Result<()> {
    let (_store, resolver, _temp_dir) = create_test_env().await?;

    // Never written to the store at all; the primed entry is authoritative
    resolver.update("primed-id", "data:;base64,PRIMED").await;

    let resolved = resolver.resolve("![p](asset://primed-id)").await;
    assert_eq!(resolved, "![p](data:;base64,PRIMED)");
    Ok(())
}

#[tokio::test]
async fn test_delete_plus_invalidate_restores_raw_token() -> Result<()> {
    let (store, resolver, _temp_dir) = create_test_env().await?;

    let asset = Asset::new("gone.png", "data:;base64,G");
    store.put_asset(asset.clone()).await?;
    let content = format!("![g](asset://{})", asset.id);

    assert!(resolver.resolve(&content).await.contains("data:;base64,G"));

    store.delete_asset(&asset.id).await?;
    resolver.invalidate(&asset.id).await;

    assert_eq!(resolver.resolve(&content).await, content);
    Ok(())
}
