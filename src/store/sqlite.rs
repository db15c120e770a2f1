//! SQLite-backed vector index using the `sqlite-vec` extension.
//!
//! Embeddings are stored as JSON float arrays and compared with
//! `vec_distance_cosine`, so similarity is cosine and consistent across
//! calls for the same stored vectors. Tie-breaks fall back to `rowid`, which
//! is preserved across upsert replacements, giving the insertion-order
//! determinism the retrieval contract requires.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use tokio::sync::Mutex;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};
use tracing::debug;

use super::{EntryMetadata, IndexEntry, VectorStore};
use crate::errors::NewsWeaveError;

/// Persistent news vector index.
///
/// Opened once per process and shared by clone; the underlying
/// `tokio_rusqlite::Connection` is itself a cheap handle onto one worker
/// thread. Upserts are serialized through `write_lock` so no two writers
/// interleave on the same id; queries bypass the lock.
#[derive(Clone)]
pub struct SqliteNewsStore {
    conn: Connection,
    write_lock: std::sync::Arc<Mutex<()>>,
}

impl SqliteNewsStore {
    /// Open (or create) the index at `path`, registering `sqlite-vec` and
    /// creating the schema on first use.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, NewsWeaveError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| NewsWeaveError::storage(err.to_string()))?;
        conn.call(|conn| {
            // Fail fast if the vec extension did not load.
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS articles (
                     id        TEXT PRIMARY KEY,
                     document  TEXT NOT NULL,
                     metadata  TEXT NOT NULL,
                     embedding TEXT NOT NULL
                 );",
            )
            .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| NewsWeaveError::storage(err.to_string()))?;
        Ok(Self {
            conn,
            write_lock: std::sync::Arc::new(Mutex::new(())),
        })
    }

    /// In-memory index for tests and ephemeral runs.
    pub async fn open_in_memory() -> Result<Self, NewsWeaveError> {
        Self::open(":memory:").await
    }

    fn register_sqlite_vec() -> Result<(), NewsWeaveError> {
        use std::sync::Mutex as StdMutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: StdMutex<Option<Result<(), String>>> = StdMutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *const c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(NewsWeaveError::Storage)
    }
}

fn row_to_entry(
    id: String,
    document: String,
    metadata: String,
    embedding: String,
) -> Result<IndexEntry, tokio_rusqlite::Error> {
    let metadata: EntryMetadata = serde_json::from_str(&metadata)
        .map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))?;
    let embedding: Vec<f32> = serde_json::from_str(&embedding)
        .map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))?;
    Ok(IndexEntry {
        id,
        embedding,
        document_text: document,
        metadata,
    })
}

#[async_trait::async_trait]
impl VectorStore for SqliteNewsStore {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize, NewsWeaveError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;
        let written = entries.len();
        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                for entry in &entries {
                    let metadata = serde_json::to_string(&entry.metadata)
                        .map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))?;
                    let embedding = serde_json::to_string(&entry.embedding)
                        .map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))?;
                    // ON CONFLICT ... DO UPDATE keeps the original rowid, so a
                    // replaced entry retains its first-insertion position for
                    // ranking tie-breaks.
                    tx.execute(
                        "INSERT INTO articles (id, document, metadata, embedding)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(id) DO UPDATE SET
                             document  = excluded.document,
                             metadata  = excluded.metadata,
                             embedding = excluded.embedding",
                        (&entry.id, &entry.document_text, &metadata, &embedding),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| NewsWeaveError::storage(err.to_string()))?;
        debug!(written, "upserted index entries");
        Ok(written)
    }

    async fn query(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<(IndexEntry, f32)>, NewsWeaveError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding_json = serde_json::to_string(query_vector)
            .map_err(|err| NewsWeaveError::storage(err.to_string()))?;
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, document, metadata, embedding,
                                vec_distance_cosine(vec_f32(embedding), vec_f32(?1)) AS distance
                         FROM articles
                         ORDER BY distance ASC, rowid ASC
                         LIMIT ?2",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map((&embedding_json, k as i64), |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, f32>(4)?,
                        ))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    let (id, document, metadata, embedding, distance) =
                        row.map_err(tokio_rusqlite::Error::Rusqlite)?;
                    let entry = row_to_entry(id, document, metadata, embedding)?;
                    // Cosine similarity from cosine distance.
                    results.push((entry, 1.0 - distance));
                }
                Ok(results)
            })
            .await
            .map_err(|err| NewsWeaveError::storage(err.to_string()))
    }

    async fn get(&self, id: &str) -> Result<Option<IndexEntry>, NewsWeaveError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, document, metadata, embedding FROM articles WHERE id = ?1",
                        [&id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                            ))
                        },
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                match row {
                    Some((id, document, metadata, embedding)) => {
                        Ok(Some(row_to_entry(id, document, metadata, embedding)?))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(|err| NewsWeaveError::storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, NewsWeaveError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| NewsWeaveError::storage(err.to_string()))
    }
}
