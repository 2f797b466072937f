//! SQLite document store: a durable local backend for the document-store contract.
//!
//! Documents are JSON bodies keyed by `(collection, id)`. WAL mode and
//! prepared statements as elsewhere; query evaluation happens in Rust over
//! the collection's rows in insertion order, so results match the in-memory
//! store exactly.
//!
//! rusqlite is synchronous. Every trait call moves its statement onto
//! tokio's blocking pool, so a tokio runtime must be running.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use rand::distr::Alphanumeric;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use super::backend::{
    BackendError, Collection, Document, DocumentStore, DocumentWrite, Fields, Query,
};
use crate::core::errors::{Result, TpError};

const ID_LEN: usize = 20;

/// SQLite-backed [`DocumentStore`].
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteDocumentStore {
    /// Open (or create) the database at `path`, applying schema and PRAGMAs.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TpError::io(parent, source))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| sql_runtime("open", &e))?;

        apply_pragmas(&conn).map_err(|e| sql_runtime("pragmas", &e))?;
        apply_schema(&conn).map_err(|e| sql_runtime("schema", &e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check that WAL mode is active (for diagnostics).
    pub fn is_wal_mode(&self) -> bool {
        self.conn
            .lock()
            .query_row("PRAGMA journal_mode", [], |row| row.get::<_, String>(0))
            .map(|mode| mode.eq_ignore_ascii_case("wal"))
            .unwrap_or(false)
    }

    /// Run `op` against the connection on the blocking pool.
    async fn blocking<T, F>(
        &self,
        collection: Collection,
        op: F,
    ) -> std::result::Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> std::result::Result<T, BackendError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || op(&conn.lock()))
            .await
            .map_err(|e| BackendError::Read {
                collection,
                details: format!("sqlite worker failed: {e}"),
            })?
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(
        &self,
        collection: Collection,
        write: DocumentWrite,
    ) -> std::result::Result<String, BackendError> {
        let id = random_id();
        let body = encode_body(collection, &write.resolve(Utc::now()))?;
        let row_id = id.clone();
        self.blocking(collection, move |conn| {
            conn.prepare_cached("INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)")
                .and_then(|mut stmt| stmt.execute(params![collection.name(), row_id, body]))
                .map_err(|e| write_err(collection, &e))?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> std::result::Result<Option<Document>, BackendError> {
        let id = id.to_string();
        self.blocking(collection, move |conn| {
            Ok(fetch(conn, collection, &id)?.map(|fields| Document { id, fields }))
        })
        .await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        write: DocumentWrite,
    ) -> std::result::Result<(), BackendError> {
        let id = id.to_string();
        let now = Utc::now();
        self.blocking(collection, move |conn| {
            let mut fields = fetch(conn, collection, &id)?.ok_or_else(|| BackendError::NotFound {
                collection,
                id: id.clone(),
            })?;
            fields.extend(write.resolve(now));
            let body = encode_body(collection, &fields)?;
            conn.execute(
                "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2",
                params![collection.name(), id, body],
            )
            .map_err(|e| write_err(collection, &e))?;
            Ok(())
        })
        .await
    }

    async fn set(
        &self,
        collection: Collection,
        id: &str,
        write: DocumentWrite,
    ) -> std::result::Result<(), BackendError> {
        let id = id.to_string();
        let body = encode_body(collection, &write.resolve(Utc::now()))?;
        self.blocking(collection, move |conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body",
                params![collection.name(), id, body],
            )
            .map_err(|e| write_err(collection, &e))?;
            Ok(())
        })
        .await
    }

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> std::result::Result<Vec<Document>, BackendError> {
        let documents = self
            .blocking(collection, move |conn| load(conn, collection))
            .await?;
        Ok(query.apply(documents))
    }
}

fn load(conn: &Connection, collection: Collection) -> std::result::Result<Vec<Document>, BackendError> {
    let mut stmt = conn
        .prepare_cached("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq ASC")
        .map_err(|e| read_err(collection, &e))?;
    let rows = stmt
        .query_map(params![collection.name()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| read_err(collection, &e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| read_err(collection, &e))?;

    rows.into_iter()
        .map(|(id, body)| decode_body(collection, id, &body))
        .collect()
}

fn fetch(
    conn: &Connection,
    collection: Collection,
    id: &str,
) -> std::result::Result<Option<Fields>, BackendError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.name(), id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| read_err(collection, &e))?;
    body.map(|body| decode_body(collection, id.to_string(), &body).map(|doc| doc.fields))
        .transpose()
}

// ──────────────────── helpers ────────────────────

fn random_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

fn encode_body(collection: Collection, fields: &Fields) -> std::result::Result<String, BackendError> {
    serde_json::to_string(fields).map_err(|e| BackendError::InvalidRecord {
        collection,
        details: e.to_string(),
    })
}

fn decode_body(
    collection: Collection,
    id: String,
    body: &str,
) -> std::result::Result<Document, BackendError> {
    match serde_json::from_str(body) {
        Ok(fields) => Ok(Document { id, fields }),
        Err(e) => Err(BackendError::Malformed {
            collection,
            id,
            details: e.to_string(),
        }),
    }
}

fn read_err(collection: Collection, e: &rusqlite::Error) -> BackendError {
    BackendError::Read {
        collection,
        details: e.to_string(),
    }
}

fn write_err(collection: Collection, e: &rusqlite::Error) -> BackendError {
    BackendError::Write {
        collection,
        details: e.to_string(),
    }
}

fn sql_runtime(stage: &str, e: &rusqlite::Error) -> TpError {
    TpError::Runtime {
        details: format!("sqlite {stage}: {e}"),
    }
}

// ──────────────────── schema & pragmas ────────────────────

fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(%mode, "requested WAL mode but sqlite reported another journal mode");
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS documents (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            UNIQUE (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq);",
    )
}

// ──────────────────── tests ────────────────────
