//! Import run bookkeeping and the legacy URL → document mapping.

use chrono::Utc;
use libsql::{Connection, params};
use publisher_shared::{PublisherError, Result};
use uuid::Uuid;

use crate::{Storage, get_i64, get_string};

/// One failed row recorded against an import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRowError {
    pub line_number: usize,
    pub message: String,
}

impl Storage {
    /// Insert a new import run. Returns the generated import id.
    pub async fn insert_import(&self, source_file: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO imports (id, source_file, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), source_file, now.as_str()],
            )
            .await
            .map_err(PublisherError::storage)?;
        Ok(id)
    }

    /// Mark an import run finished with its summary statistics.
    pub async fn finish_import(&self, import_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE imports SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, import_id],
            )
            .await
            .map_err(PublisherError::storage)?;
        Ok(())
    }

    pub async fn record_import_error(
        &self,
        import_id: &str,
        line_number: usize,
        message: &str,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO import_errors (import_id, line_number, message) VALUES (?1, ?2, ?3)",
                params![import_id, line_number as i64, message],
            )
            .await
            .map_err(PublisherError::storage)?;
        Ok(())
    }

    /// Errors recorded for an import run, in the order they were recorded.
    pub async fn import_errors(&self, import_id: &str) -> Result<Vec<ImportRowError>> {
        let mut rows = self
            .conn
            .query(
                "SELECT line_number, message FROM import_errors WHERE import_id = ?1 ORDER BY id",
                params![import_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ImportRowError {
                line_number: get_i64(&row, 0)? as usize,
                message: get_string(&row, 1)?,
            });
        }
        Ok(results)
    }

    /// Document previously imported from `url`, if any.
    pub async fn find_document_source(&self, url: &str) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT document_id FROM document_sources WHERE url = ?1",
                params![url],
            )
            .await
            .map_err(PublisherError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(get_i64(&row, 0)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PublisherError::storage(e)),
        }
    }
}

pub(crate) async fn insert_document_source(
    conn: &Connection,
    url: &str,
    document_id: i64,
    import_id: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO document_sources (url, document_id, import_id) VALUES (?1, ?2, ?3)",
        params![url, document_id, import_id],
    )
    .await
    .map_err(PublisherError::storage)?;
    Ok(())
}

pub(crate) async fn add_collection_membership(
    conn: &Connection,
    collection_id: i64,
    document_id: i64,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO document_collection_memberships (collection_id, document_id)
         VALUES (?1, ?2)",
        params![collection_id, document_id],
    )
    .await
    .map_err(PublisherError::storage)?;
    Ok(())
}
