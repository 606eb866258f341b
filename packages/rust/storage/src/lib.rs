//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding documents, editions,
//! the records they reference, the edition dependency graph, and import runs.
//!
//! **Access rules:**
//! - CLI commands and the import driver: read-write via [`Storage::open`]
//! - Inspection tooling: read-only via [`Storage::open_readonly`]
//!
//! Writes that must become visible together go through a
//! [`StorageTransaction`] obtained from [`Storage::begin`].

mod dependencies;
mod editions;
mod imports;
mod migrations;
mod records;
mod transaction;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use publisher_shared::{PublisherError, Result};

pub use editions::{Attachment, NewAttachment, NewEdition};
pub use imports::ImportRowError;
pub use transaction::StorageTransaction;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PublisherError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(PublisherError::storage)?;

        let conn = db.connect().map_err(PublisherError::storage)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(PublisherError::storage)?;

        let conn = db.connect().map_err(PublisherError::storage)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    PublisherError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PublisherError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    /// Start a transaction. Nothing written through it is visible to other
    /// connections until [`StorageTransaction::commit`].
    pub async fn begin(&self) -> Result<StorageTransaction> {
        self.check_writable()?;
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(PublisherError::storage)?;
        Ok(StorageTransaction::new(tx))
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

pub(crate) fn get_i64(row: &libsql::Row, idx: i32) -> Result<i64> {
    row.get::<i64>(idx).map_err(PublisherError::storage)
}

pub(crate) fn get_string(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(PublisherError::storage)
}

/// Nullable text column.
pub(crate) fn get_opt_string(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok()
}

pub(crate) fn get_opt_i64(row: &libsql::Row, idx: i32) -> Option<i64> {
    row.get::<i64>(idx).ok()
}

pub(crate) fn get_timestamp(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>> {
    parse_timestamp(&get_string(row, idx)?)
}

pub(crate) fn get_opt_timestamp(row: &libsql::Row, idx: i32) -> Result<Option<DateTime<Utc>>> {
    get_opt_string(row, idx)
        .map(|s| parse_timestamp(&s))
        .transpose()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PublisherError::Storage(format!("invalid date '{s}': {e}")))
}

pub(crate) fn format_timestamp(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339())
}
