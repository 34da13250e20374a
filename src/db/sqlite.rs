use crate::db::models::{DbChunk, DbDocument, ExtractionCounts};
use crate::db::schema::SQLITE_INIT;
use crate::error::GmaoError;
use crate::types::domain::{DocumentCategory, DocumentStatus};
use crate::types::extraction::DocumentMetadata;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use uuid::Uuid;

pub type SqlitePool = Pool<Sqlite>;

/// Handle over the relational store. Cheap to clone.
///
/// Entity-specific queries live next to this file (`assets.rs`,
/// `work_orders.rs`, `dependencies.rs`, `conversations.rs`) as further
/// `impl GmaoStorage` blocks.
#[derive(Clone)]
pub struct GmaoStorage {
    pub(super) pool: SqlitePool,
}

impl GmaoStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and apply the schema.
    ///
    /// In-memory databases are pinned to a single never-recycled connection,
    /// otherwise every pooled connection would see its own empty database.
    pub async fn connect(database_url: &str) -> Result<Self, GmaoError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };
        let pool = pool_opts.connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), GmaoError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ---- documents -------------------------------------------------------

    pub async fn insert_document(
        &self,
        file_name: &str,
        content_hash: &str,
        storage_path: &str,
        size_bytes: i64,
        asset_id: Option<&str>,
    ) -> Result<DbDocument, GmaoError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO documents (
                id, file_name, content_hash, storage_path, size_bytes,
                status, asset_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(file_name)
        .bind(content_hash)
        .bind(storage_path)
        .bind(size_bytes)
        .bind(DocumentStatus::Processing)
        .bind(asset_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        self.get_document(&id).await
    }

    pub async fn get_document(&self, id: &str) -> Result<DbDocument, GmaoError> {
        sqlx::query_as::<_, DbDocument>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GmaoError::NotFound("document"))
    }

    pub async fn find_document_by_hash(
        &self,
        content_hash: &str,
    ) -> Result<Option<DbDocument>, GmaoError> {
        let doc = sqlx::query_as::<_, DbDocument>("SELECT * FROM documents WHERE content_hash = ?")
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    pub async fn list_documents(&self, asset_id: Option<&str>) -> Result<Vec<DbDocument>, GmaoError> {
        let rows = sqlx::query_as::<_, DbDocument>(
            r#"SELECT * FROM documents
               WHERE (?1 IS NULL
                      OR asset_id = ?1
                      OR id IN (SELECT document_id FROM document_assets WHERE asset_id = ?1))
               ORDER BY created_at DESC"#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn mark_document_processing(&self, id: &str) -> Result<(), GmaoError> {
        sqlx::query("UPDATE documents SET status = ?, error = NULL, updated_at = ? WHERE id = ?")
            .bind(DocumentStatus::Processing)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Move a document to `processing` unless it already is. `false` means
    /// another extraction holds it.
    pub async fn claim_document_for_processing(&self, id: &str) -> Result<bool, GmaoError> {
        let res = sqlx::query(
            "UPDATE documents SET status = ?1, error = NULL, updated_at = ?2 WHERE id = ?3 AND status != ?1",
        )
        .bind(DocumentStatus::Processing)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn mark_document_extracted(
        &self,
        id: &str,
        category: DocumentCategory,
        counts: ExtractionCounts,
    ) -> Result<(), GmaoError> {
        sqlx::query(
            r#"UPDATE documents SET
                status = ?, category = ?, error = NULL,
                assets_found = ?, components_found = ?, spare_parts_found = ?, tasks_found = ?,
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(DocumentStatus::Extracted)
        .bind(category)
        .bind(counts.assets)
        .bind(counts.components)
        .bind(counts.spare_parts)
        .bind(counts.tasks)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_document_failed(&self, id: &str, error: &str) -> Result<(), GmaoError> {
        sqlx::query("UPDATE documents SET status = ?, error = ?, updated_at = ? WHERE id = ?")
            .bind(DocumentStatus::Failed)
            .bind(error)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fail documents left in `processing` by a previous run so they can be
    /// reprocessed. Returns how many were touched.
    pub async fn fail_interrupted_documents(&self) -> Result<u64, GmaoError> {
        let res = sqlx::query("UPDATE documents SET status = ?, error = ?, updated_at = ? WHERE status = ?")
            .bind(DocumentStatus::Failed)
            .bind("extraction interrupted by a restart")
            .bind(Utc::now())
            .bind(DocumentStatus::Processing)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    /// Record that the document describes `asset_id`. The first asset linked
    /// also becomes the document's primary asset when it has none.
    pub async fn link_document_asset(&self, id: &str, asset_id: &str) -> Result<(), GmaoError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO document_assets (document_id, asset_id) VALUES (?, ?)")
            .bind(id)
            .bind(asset_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE documents SET asset_id = COALESCE(asset_id, ?) WHERE id = ?")
            .bind(asset_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ---- chunks ----------------------------------------------------------

    /// Replace every chunk of a document in one transaction.
    pub async fn replace_chunks(
        &self,
        document_id: &str,
        chunks: &[(String, String)],
    ) -> Result<usize, GmaoError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        for (ordinal, (heading, content)) in chunks.iter().enumerate() {
            sqlx::query(
                "INSERT INTO document_chunks (document_id, ordinal, heading, content) VALUES (?, ?, ?, ?)",
            )
            .bind(document_id)
            .bind(ordinal as i64)
            .bind(heading)
            .bind(content)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(chunks.len())
    }

    /// Chunks of extracted documents, optionally only those linked to `asset_id`
    /// (as its primary asset, through the link table, or through an asset the
    /// document produced).
    pub async fn list_chunks(&self, asset_id: Option<&str>) -> Result<Vec<DbChunk>, GmaoError> {
        let rows = sqlx::query_as::<_, DbChunk>(
            r#"SELECT c.* FROM document_chunks c
               JOIN documents d ON d.id = c.document_id
               WHERE d.status = 'extracted'
                 AND (?1 IS NULL
                      OR d.asset_id = ?1
                      OR EXISTS (SELECT 1 FROM document_assets da
                                 WHERE da.document_id = d.id AND da.asset_id = ?1)
                      OR EXISTS (SELECT 1 FROM assets a
                                 WHERE a.id = ?1 AND a.source_document_id = d.id))
               ORDER BY c.document_id, c.ordinal"#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- metadata cache --------------------------------------------------

    pub async fn get_cached_metadata(
        &self,
        content_hash: &str,
    ) -> Result<Option<DocumentMetadata>, GmaoError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT metadata FROM metadata_cache WHERE content_hash = ?")
                .bind(content_hash)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(json,)| serde_json::from_str(&json))
            .transpose()
            .map_err(GmaoError::from)
    }

    pub async fn put_cached_metadata(
        &self,
        content_hash: &str,
        metadata: &DocumentMetadata,
    ) -> Result<(), GmaoError> {
        let json = serde_json::to_string(metadata)?;
        sqlx::query(
            r#"INSERT INTO metadata_cache (content_hash, metadata, created_at) VALUES (?, ?, ?)
               ON CONFLICT(content_hash) DO UPDATE SET
                   metadata = excluded.metadata,
                   created_at = excluded.created_at"#,
        )
        .bind(content_hash)
        .bind(json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> GmaoStorage {
        GmaoStorage::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn document_lifecycle() {
        let db = storage().await;
        let doc = db
            .insert_document("ga37.pdf", "abc123", "/tmp/abc123.pdf", 1024, None)
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert_eq!(
            db.find_document_by_hash("abc123").await.unwrap().map(|d| d.id),
            Some(doc.id.clone())
        );

        let counts = ExtractionCounts {
            assets: 2,
            components: 5,
            spare_parts: 9,
            tasks: 4,
        };
        db.mark_document_extracted(&doc.id, DocumentCategory::Manual, counts)
            .await
            .unwrap();
        let doc = db.get_document(&doc.id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Extracted);
        assert_eq!(doc.category, Some(DocumentCategory::Manual));
        assert_eq!(doc.spare_parts_found, 9);

        db.mark_document_failed(&doc.id, "model unavailable").await.unwrap();
        let doc = db.get_document(&doc.id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error.as_deref(), Some("model unavailable"));
    }

    #[tokio::test]
    async fn interrupted_documents_are_failed() {
        let db = storage().await;
        let stuck = db
            .insert_document("a.pdf", "h1", "/tmp/h1.pdf", 10, None)
            .await
            .unwrap();
        let done = db
            .insert_document("b.pdf", "h2", "/tmp/h2.pdf", 10, None)
            .await
            .unwrap();
        db.mark_document_extracted(&done.id, DocumentCategory::Manual, ExtractionCounts::default())
            .await
            .unwrap();

        assert_eq!(db.fail_interrupted_documents().await.unwrap(), 1);
        assert_eq!(db.get_document(&stuck.id).await.unwrap().status, DocumentStatus::Failed);
        assert_eq!(db.get_document(&done.id).await.unwrap().status, DocumentStatus::Extracted);
    }

    #[tokio::test]
    async fn only_one_claim_wins_a_document() {
        let db = storage().await;
        let doc = db.insert_document("a.pdf", "h", "/tmp/a", 1, None).await.unwrap();
        assert!(!db.claim_document_for_processing(&doc.id).await.unwrap());

        db.mark_document_failed(&doc.id, "model unavailable").await.unwrap();
        let (first, second) = tokio::join!(
            db.claim_document_for_processing(&doc.id),
            db.claim_document_for_processing(&doc.id)
        );
        assert!(first.unwrap() ^ second.unwrap());
        let doc = db.get_document(&doc.id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert!(doc.error.is_none());
    }

    #[tokio::test]
    async fn duplicate_hash_is_rejected_by_schema() {
        let db = storage().await;
        db.insert_document("a.pdf", "same", "/tmp/a", 1, None).await.unwrap();
        let err = db.insert_document("b.pdf", "same", "/tmp/b", 1, None).await;
        assert!(matches!(err, Err(GmaoError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn chunks_are_replaced_and_only_listed_once_extracted() {
        let db = storage().await;
        let doc = db.insert_document("a.pdf", "h", "/tmp/a", 1, None).await.unwrap();
        db.replace_chunks(&doc.id, &[("Old".into(), "old".into())]).await.unwrap();
        db.replace_chunks(
            &doc.id,
            &[
                ("Lubrication".into(), "Grease every 500 h".into()),
                ("Filters".into(), "Replace the oil filter".into()),
            ],
        )
        .await
        .unwrap();
        assert!(db.list_chunks(None).await.unwrap().is_empty());

        db.mark_document_extracted(&doc.id, DocumentCategory::Manual, Default::default())
            .await
            .unwrap();
        let chunks = db.list_chunks(None).await.unwrap();
        let headings: Vec<_> = chunks.iter().map(|c| c.heading.as_str()).collect();
        assert_eq!(headings, ["Lubrication", "Filters"]);
    }

    #[tokio::test]
    async fn metadata_cache_upserts() {
        let db = storage().await;
        assert_eq!(db.get_cached_metadata("h").await.unwrap(), None);
        let mut meta = DocumentMetadata {
            title: Some("Manual".into()),
            ..Default::default()
        };
        db.put_cached_metadata("h", &meta).await.unwrap();
        meta.revision = Some("B".into());
        db.put_cached_metadata("h", &meta).await.unwrap();
        assert_eq!(db.get_cached_metadata("h").await.unwrap(), Some(meta));
    }
}
