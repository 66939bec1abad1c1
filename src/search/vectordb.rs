//! Vector index
//!
//! `VectorIndex` is the storage seam of the knowledge base: records of
//! (id, embedding, document, flat metadata) with nearest-neighbor queries.
//! `SqliteIndex` stores embeddings as BLOBs and ranks by brute force in Rust,
//! which is O(n) per query and fine for modest corpora.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::distance::DistanceMetric;
use crate::core::error::{KbError, Result};
use crate::core::insight::{Metadata, MetadataValue};

/// A record to write into the index
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: Metadata,
}

/// A nearest-neighbor hit
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    pub distance: f32,
}

/// A record fetched by id
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: Metadata,
}

/// Metadata of one record, as returned by a full scan
#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub id: String,
    pub metadata: Metadata,
}

/// Metadata predicate applied before ranking
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    /// Field equals value
    Eq { key: String, value: MetadataValue },
    /// Comma-separated text field contains `item` as a whole entry
    ListContains { key: String, item: String },
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn equals(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn list_contains(key: impl Into<String>, item: impl Into<String>) -> Self {
        Self::ListContains {
            key: key.into(),
            item: item.into(),
        }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { key, value } => metadata.get(key) == Some(value),
            Self::ListContains { key, item } => metadata
                .get(key)
                .and_then(MetadataValue::as_str)
                .is_some_and(|list| list.split(',').any(|entry| entry.trim() == item)),
            Self::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

/// Persistent nearest-neighbor store.
///
/// Implementations own their synchronization; the knowledge base calls them
/// concurrently through a shared reference.
pub trait VectorIndex: Send + Sync {
    /// Metric behind the distances `query` reports
    fn metric(&self) -> DistanceMetric;

    /// Insert or replace the record with `record.id`
    fn upsert(&self, record: IndexRecord) -> Result<()>;

    /// Up to `top_k` records matching `filter`, by ascending distance
    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>>;

    fn get(&self, id: &str) -> Result<Option<StoredRecord>>;

    /// Metadata of every record. O(n).
    fn scan_all(&self) -> Result<Vec<ScanEntry>>;

    /// Returns `true` when a record was removed
    fn delete(&self, id: &str) -> Result<bool>;

    fn count(&self) -> Result<usize>;

    /// Embedding dimension fixed by the first upsert, `None` before it
    fn dimension(&self) -> Result<Option<usize>>;
}

const META_DIMENSION: &str = "dimension";
const META_METRIC: &str = "metric";

/// SQLite-backed vector index
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    metric: DistanceMetric,
}

impl SqliteIndex {
    /// Open or create an index at path.
    ///
    /// Fails if the file was created with a different metric.
    pub fn open(db_path: &Path, metric: DistanceMetric) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::init(conn, metric)
    }

    /// In-memory index (for testing)
    pub fn open_in_memory(metric: DistanceMetric) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, metric)
    }

    fn init(conn: Connection, metric: DistanceMetric) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                metadata TEXT NOT NULL,  -- JSON object of scalars
                embedding BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![META_METRIC],
                |row| row.get(0),
            )
            .optional()?;

        match stored.as_deref().map(DistanceMetric::parse) {
            Some(Some(existing)) if existing != metric => {
                return Err(KbError::Config(format!(
                    "index was built with metric '{}', requested '{}'",
                    existing, metric
                )));
            }
            Some(Some(_)) => {}
            Some(None) | None => {
                conn.execute(
                    "INSERT INTO index_meta (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![META_METRIC, metric.as_str()],
                )?;
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            metric,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| KbError::Storage(format!("Lock poisoned: {}", e)))
    }

    fn stored_dimension(conn: &Connection) -> Result<Option<usize>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![META_DIMENSION],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    fn check_dimension(conn: &Connection, actual: usize) -> Result<()> {
        match Self::stored_dimension(conn)? {
            Some(expected) if expected != actual => {
                Err(KbError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

impl VectorIndex for SqliteIndex {
    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn upsert(&self, record: IndexRecord) -> Result<()> {
        let metadata_json = serde_json::to_string(&record.metadata)?;
        let blob = embedding_to_blob(&record.embedding);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        match Self::stored_dimension(&tx)? {
            Some(expected) if expected != record.embedding.len() => {
                return Err(KbError::DimensionMismatch {
                    expected,
                    actual: record.embedding.len(),
                });
            }
            Some(_) => {}
            None => {
                tx.execute(
                    "INSERT INTO index_meta (key, value) VALUES (?1, ?2)",
                    params![META_DIMENSION, record.embedding.len().to_string()],
                )?;
            }
        }

        tx.execute(
            r#"
            INSERT INTO records (id, document, metadata, embedding)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                metadata = excluded.metadata,
                embedding = excluded.embedding
            "#,
            params![record.id, record.document, metadata_json, blob],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        Self::check_dimension(&conn, vector.len())?;

        let mut stmt = conn.prepare("SELECT id, document, metadata, embedding FROM records")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, document, metadata_json, blob) = row?;
            let metadata = parse_metadata(&id, &metadata_json);
            if filter.is_some_and(|f| !f.matches(&metadata)) {
                continue;
            }
            let distance = self.metric.distance(vector, &blob_to_embedding(&blob));
            hits.push(QueryHit {
                id,
                document,
                metadata,
                distance,
            });
        }

        // Ascending distance, ties by id
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);

        debug!("Index query returned {} hits", hits.len());
        Ok(hits)
    }

    fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT document, metadata, embedding FROM records WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(document, metadata_json, blob)| StoredRecord {
            id: id.to_string(),
            embedding: blob_to_embedding(&blob),
            document,
            metadata: parse_metadata(id, &metadata_json),
        }))
    }

    fn scan_all(&self) -> Result<Vec<ScanEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, metadata FROM records ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, metadata_json) = row?;
            let metadata = parse_metadata(&id, &metadata_json);
            entries.push(ScanEntry { id, metadata });
        }
        Ok(entries)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM records WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn dimension(&self) -> Result<Option<usize>> {
        let conn = self.lock()?;
        Self::stored_dimension(&conn)
    }
}

/// Unreadable metadata degrades to an empty map
fn parse_metadata(id: &str, raw: &str) -> Metadata {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Malformed metadata on record {}: {}", id, e);
        Metadata::new()
    })
}

/// Convert f32 embedding to BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert BLOB to f32 embedding
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
