//! SQLite-backed vector store
//!
//! Documents live in one append-only table; embeddings are little-endian
//! `f32` BLOBs. Search is a full table scan in rowid (insertion) order.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use rusqlite_migration::{M, Migrations};

use super::VectorStore;
use super::traits::passes_threshold;
use crate::error::Result;
use crate::models::StoredDocument;

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        r#"
        CREATE TABLE documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email_id TEXT NOT NULL,
            contents TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dimensions INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_documents_email_id ON documents(email_id);
        "#,
    )])
}

pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) the database at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(db_path.as_ref())?)
    }

    /// Private database, gone when dropped
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL: readers don't block the single writer; NORMAL sync is safe with WAL
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations().to_latest(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl VectorStore for SqliteVectorStore {
    fn insert(&self, document: StoredDocument) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO documents (email_id, contents, embedding, dimensions) VALUES (?, ?, ?, ?)",
            params![
                document.email_id,
                document.contents,
                vec_to_blob(&document.embedding),
                document.dimensions() as i64,
            ],
        )?;
        Ok(())
    }

    fn documents(&self) -> Result<Vec<StoredDocument>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT contents, embedding, email_id FROM documents ORDER BY id")?;

        let documents = stmt
            .query_map([], |row| {
                let blob: Vec<u8> = row.get(1)?;
                Ok(StoredDocument {
                    contents: row.get(0)?,
                    embedding: blob_to_vec(&blob),
                    email_id: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    fn contains_source(&self, email_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE email_id = ?)",
            [email_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Streams rows instead of materializing every document
    fn search(&self, query: &[f32], threshold: f32) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        // Mismatched dimensions never match; filter them in SQL
        let mut stmt = conn.prepare(
            "SELECT contents, embedding FROM documents WHERE dimensions = ? ORDER BY id",
        )?;
        let mut rows = stmt.query([query.len() as i64])?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next()? {
            let blob: Vec<u8> = row.get(1)?;
            if passes_threshold(&blob_to_vec(&blob), query, threshold) {
                hits.push(row.get(0)?);
            }
        }

        Ok(hits)
    }
}

/// Encode a float vector as little-endian bytes for BLOB storage
fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]
fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
