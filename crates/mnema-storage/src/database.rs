// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use mnema_core::MnemaError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Convert a tokio_rusqlite error into MnemaError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> MnemaError {
    MnemaError::Storage {
        source: Box::new(e),
    }
}

/// Handle to an open SQLite database with migrations applied.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run
    /// pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, MnemaError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| MnemaError::Storage {
                source: Box::new(e),
            })?;
        }

        // `open` fails with a plain rusqlite error, not the call-path
        // wrapper type.
        let conn = Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;
        Self::setup(conn, wal_mode).await
    }

    /// Open an in-memory database with migrations applied. For tests.
    pub async fn open_in_memory() -> Result<Self, MnemaError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| map_tr_err(e.into()))?;
        Self::setup(conn, false).await
    }

    async fn setup(conn: Connection, wal_mode: bool) -> Result<Self, MnemaError> {
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(migrations::run_migrations)
            .await
            .map_err(|e| match e {
                tokio_rusqlite::Error::Error(e) => e,
                other => MnemaError::Storage {
                    source: other.to_string().into(),
                },
            })?;

        debug!("database open, migrations applied");
        Ok(Self { conn })
    }

    /// Access the underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("mnema.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        assert!(path.exists(), "database file should be created");

        // Migrations applied: documents table exists.
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT count(*) FROM documents;")?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn open_is_idempotent_across_restarts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mnema.db");
        drop(Database::open(path.to_str().unwrap(), true).await.unwrap());
        // Reopening must not re-run migrations destructively.
        drop(Database::open(path.to_str().unwrap(), true).await.unwrap());
    }

    #[tokio::test]
    async fn in_memory_open_applies_schema() {
        let db = Database::open_in_memory().await.unwrap();
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT count(*) FROM documents;")?;
                Ok(())
            })
            .await
            .unwrap();
    }
}
