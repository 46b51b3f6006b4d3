// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the DocumentIndex trait.
//!
//! Filters compile to WHERE clauses. Vector scoring happens in process:
//! matching rows are pulled with their embedding BLOBs and cosine-scored
//! against the query vector.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use mnema_config::model::StorageConfig;
use mnema_core::types::{
    blob_to_vec, cosine_similarity, vec_to_blob, Document, DocumentFilter, OrderBy,
    ScoredDocument, SearchRequest,
};
use mnema_core::{AdapterType, DocumentIndex, HealthStatus, MnemaError, PluginAdapter};

use crate::database::{map_tr_err, Database};

const DOCUMENT_COLUMNS: &str = "id, content, embedding, category, summary, content_hash, \
     timestamp, source_url, title, topic, thread_id, record_type";

/// SQLite-backed document index.
///
/// The database is lazily opened on the first call to [`SqliteIndex::initialize`].
pub struct SqliteIndex {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteIndex {
    /// Create a new SqliteIndex with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database at the configured path and run migrations.
    pub async fn initialize(&self) -> Result<(), MnemaError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| MnemaError::Storage {
            source: "index already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite index initialized");
        Ok(())
    }

    /// Open an in-memory database instead of the configured path. For tests.
    pub async fn initialize_in_memory(&self) -> Result<(), MnemaError> {
        let db = Database::open_in_memory().await?;
        self.db.set(db).map_err(|_| MnemaError::Storage {
            source: "index already initialized".into(),
        })?;
        Ok(())
    }

    fn db(&self) -> Result<&Database, MnemaError> {
        self.db.get().ok_or_else(|| MnemaError::Storage {
            source: "index not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteIndex {
    fn name(&self) -> &str {
        "sqlite-index"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemaError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MnemaError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentIndex for SqliteIndex {
    async fn upsert(&self, document: Document) -> Result<(), MnemaError> {
        let db = self.db()?;
        let embedding_blob = vec_to_blob(&document.embedding);
        db.connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO documents (id, content, embedding, category, summary, \
                     content_hash, timestamp, source_url, title, topic, thread_id, record_type) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    rusqlite::params![
                        document.id,
                        document.content,
                        embedding_blob,
                        document.category,
                        document.summary,
                        document.content_hash,
                        document.timestamp,
                        document.source_url,
                        document.title,
                        document.topic,
                        document.thread_id,
                        document.record_type,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredDocument>, MnemaError> {
        let db = self.db()?;
        let (where_clause, params) = build_where(&request.filter);

        match request.vector {
            Some(vector) => {
                // Pull all matching rows and cosine-score in process.
                let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents{where_clause}");
                let top = request.top;
                let mut scored = db
                    .connection()
                    .call(move |conn| {
                        let mut stmt = conn.prepare(&sql)?;
                        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                            params.iter().map(|p| p as &dyn rusqlite::types::ToSql).collect();
                        let docs = stmt
                            .query_map(param_refs.as_slice(), row_to_document)?
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(docs)
                    })
                    .await
                    .map_err(map_tr_err)?
                    .into_iter()
                    .map(|document| {
                        let score = if document.embedding.is_empty() {
                            0.0
                        } else {
                            cosine_similarity(&vector, &document.embedding)
                        };
                        ScoredDocument { document, score }
                    })
                    .collect::<Vec<_>>();

                scored.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                scored.truncate(top);
                Ok(scored)
            }
            None => {
                let order = match request.order_by.unwrap_or(OrderBy::TimestampDesc) {
                    OrderBy::TimestampDesc => "DESC",
                    OrderBy::TimestampAsc => "ASC",
                };
                let sql = format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents{where_clause} \
                     ORDER BY timestamp {order} LIMIT {top}",
                    top = request.top
                );
                let docs = db
                    .connection()
                    .call(move |conn| {
                        let mut stmt = conn.prepare(&sql)?;
                        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                            params.iter().map(|p| p as &dyn rusqlite::types::ToSql).collect();
                        let docs = stmt
                            .query_map(param_refs.as_slice(), row_to_document)?
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(docs)
                    })
                    .await
                    .map_err(map_tr_err)?;
                Ok(docs
                    .into_iter()
                    .map(|document| ScoredDocument {
                        document,
                        score: 0.0,
                    })
                    .collect())
            }
        }
    }

    async fn delete(&self, ids: &[String]) -> Result<(), MnemaError> {
        if ids.is_empty() {
            return Ok(());
        }
        let db = self.db()?;
        let ids = ids.to_vec();
        db.connection()
            .call(move |conn| {
                let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "DELETE FROM documents WHERE id IN ({})",
                    placeholders.join(", ")
                );
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();
                conn.execute(&sql, param_refs.as_slice())?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Compile a filter to a WHERE clause and its positional parameters.
fn build_where(filter: &DocumentFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    let mut push = |column: &str, op: &str, value: &Option<String>| {
        if let Some(v) = value {
            params.push(v.clone());
            clauses.push(format!("{column} {op} ?{}", params.len()));
        }
    };

    push("thread_id", "=", &filter.thread_id);
    push("record_type", "=", &filter.record_type);
    push("topic", "=", &filter.topic);
    push("category", "=", &filter.category);
    push("content_hash", "=", &filter.content_hash);
    push("timestamp", ">", &filter.timestamp_after);

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Convert a rusqlite Row to a Document.
fn row_to_document(row: &rusqlite::Row) -> Result<Document, rusqlite::Error> {
    let embedding_blob: Vec<u8> = row.get(2)?;
    Ok(Document {
        id: row.get(0)?,
        content: row.get(1)?,
        embedding: blob_to_vec(&embedding_blob),
        category: row.get(3)?,
        summary: row.get(4)?,
        content_hash: row.get(5)?,
        timestamp: row.get(6)?,
        source_url: row.get(7)?,
        title: row.get(8)?,
        topic: row.get(9)?,
        thread_id: row.get(10)?,
        record_type: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnema_core::types::now_timestamp;

    async fn setup_index() -> SqliteIndex {
        let index = SqliteIndex::new(StorageConfig::default());
        index.initialize_in_memory().await.unwrap();
        index
    }

    fn make_doc(id: &str, content: &str, embedding: Vec<f32>) -> Document {
        Document {
            id: id.to_string(),
            content: content.to_string(),
            embedding,
            category: "personal_fact".to_string(),
            summary: content.to_string(),
            content_hash: None,
            timestamp: now_timestamp(),
            source_url: None,
            title: None,
            topic: None,
            thread_id: Some("thread-1".to_string()),
            record_type: Some("memory".to_string()),
        }
    }

    #[tokio::test]
    async fn upsert_and_filtered_search() {
        let index = setup_index().await;
        index
            .upsert(make_doc("d1", "User's name is Jack", vec![0.1; 8]))
            .await
            .unwrap();

        let filter = DocumentFilter {
            thread_id: Some("thread-1".to_string()),
            ..Default::default()
        };
        let results = index
            .search(SearchRequest::filtered(filter, 10))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "d1");
        assert_eq!(results[0].score, 0.0);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_id() {
        let index = setup_index().await;
        index
            .upsert(make_doc("d1", "old content", vec![0.1; 8]))
            .await
            .unwrap();
        index
            .upsert(make_doc("d1", "new content", vec![0.2; 8]))
            .await
            .unwrap();

        let results = index
            .search(SearchRequest::filtered(DocumentFilter::default(), 10))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.content, "new content");
    }

    #[tokio::test]
    async fn vector_search_orders_by_similarity() {
        let index = setup_index().await;
        index
            .upsert(make_doc("close", "similar", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert(make_doc("far", "different", vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();

        let request = SearchRequest {
            filter: DocumentFilter::default(),
            vector: Some(vec![1.0, 0.0, 0.0]),
            order_by: None,
            top: 2,
        };
        let results = index.search(request).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.id, "close");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn vector_search_respects_top() {
        let index = setup_index().await;
        for i in 0..5 {
            index
                .upsert(make_doc(&format!("d{i}"), "content", vec![0.5, 0.5]))
                .await
                .unwrap();
        }

        let request = SearchRequest {
            filter: DocumentFilter::default(),
            vector: Some(vec![1.0, 0.0]),
            order_by: None,
            top: 3,
        };
        let results = index.search(request).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn filter_on_record_type_and_topic() {
        let index = setup_index().await;
        let mut fact = make_doc("fact", "shared fact", vec![]);
        fact.record_type = Some("shared_fact".to_string());
        fact.topic = Some("weather_london".to_string());
        index.upsert(fact).await.unwrap();
        index
            .upsert(make_doc("mem", "a memory", vec![]))
            .await
            .unwrap();

        let filter = DocumentFilter {
            record_type: Some("shared_fact".to_string()),
            topic: Some("weather_london".to_string()),
            ..Default::default()
        };
        let results = index
            .search(SearchRequest::filtered(filter, 10))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "fact");
    }

    #[tokio::test]
    async fn timestamp_after_is_strict() {
        let index = setup_index().await;
        let mut doc = make_doc("d1", "content", vec![]);
        doc.timestamp = "2026-03-01T12:00:00.000Z".to_string();
        index.upsert(doc).await.unwrap();

        let exact = DocumentFilter {
            timestamp_after: Some("2026-03-01T12:00:00.000Z".to_string()),
            ..Default::default()
        };
        let results = index
            .search(SearchRequest::filtered(exact, 10))
            .await
            .unwrap();
        assert!(results.is_empty(), "equal timestamp must be excluded");

        let earlier = DocumentFilter {
            timestamp_after: Some("2026-03-01T11:59:59.999Z".to_string()),
            ..Default::default()
        };
        let results = index
            .search(SearchRequest::filtered(earlier, 10))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn filtered_search_orders_desc_by_default() {
        let index = setup_index().await;
        let mut old = make_doc("old", "first", vec![]);
        old.timestamp = "2026-03-01T10:00:00.000Z".to_string();
        let mut new = make_doc("new", "second", vec![]);
        new.timestamp = "2026-03-01T11:00:00.000Z".to_string();
        index.upsert(old).await.unwrap();
        index.upsert(new).await.unwrap();

        let results = index
            .search(SearchRequest::filtered(DocumentFilter::default(), 10))
            .await
            .unwrap();
        assert_eq!(results[0].document.id, "new");
        assert_eq!(results[1].document.id, "old");
    }

    #[tokio::test]
    async fn order_by_asc_returns_oldest_first() {
        let index = setup_index().await;
        let mut old = make_doc("old", "first", vec![]);
        old.timestamp = "2026-03-01T10:00:00.000Z".to_string();
        let mut new = make_doc("new", "second", vec![]);
        new.timestamp = "2026-03-01T11:00:00.000Z".to_string();
        index.upsert(old).await.unwrap();
        index.upsert(new).await.unwrap();

        let request = SearchRequest {
            filter: DocumentFilter::default(),
            vector: None,
            order_by: Some(OrderBy::TimestampAsc),
            top: 10,
        };
        let results = index.search(request).await.unwrap();
        assert_eq!(results[0].document.id, "old");
    }

    #[tokio::test]
    async fn delete_removes_documents() {
        let index = setup_index().await;
        index.upsert(make_doc("d1", "one", vec![])).await.unwrap();
        index.upsert(make_doc("d2", "two", vec![])).await.unwrap();

        index.delete(&["d1".to_string()]).await.unwrap();

        let results = index
            .search(SearchRequest::filtered(DocumentFilter::default(), 10))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "d2");
    }

    #[tokio::test]
    async fn delete_empty_ids_is_noop() {
        let index = setup_index().await;
        index.delete(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn embedding_blob_roundtrip() {
        let index = setup_index().await;
        let embedding: Vec<f32> = (0..384).map(|i| i as f32 / 384.0).collect();
        index
            .upsert(make_doc("d1", "content", embedding.clone()))
            .await
            .unwrap();

        let results = index
            .search(SearchRequest::filtered(DocumentFilter::default(), 1))
            .await
            .unwrap();
        let stored = &results[0].document.embedding;
        assert_eq!(stored.len(), 384);
        for (a, b) in embedding.iter().zip(stored.iter()) {
            assert!((a - b).abs() < f32::EPSILON);
        }
    }

    #[tokio::test]
    async fn search_before_initialize_fails() {
        let index = SqliteIndex::new(StorageConfig::default());
        let result = index
            .search(SearchRequest::filtered(DocumentFilter::default(), 10))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn health_check_returns_healthy() {
        let index = setup_index().await;
        let status = index.health_check().await.unwrap();
        assert_eq!(status, HealthStatus::Healthy);
    }
}
