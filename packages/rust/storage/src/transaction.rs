//! Atomic write scope over the storage connection.

use chrono::Utc;
use libsql::{Transaction, params};
use publisher_shared::{Dependable, Edition, EditionKind, EditionState, PublisherError, Result};

use crate::editions::{self, NewAttachment, NewEdition};
use crate::{dependencies, format_timestamp, get_i64, imports};

/// Writes issued through this handle commit or roll back together.
///
/// Dropping it without calling [`commit`](Self::commit) discards the writes.
pub struct StorageTransaction {
    tx: Transaction,
}

impl StorageTransaction {
    pub(crate) fn new(tx: Transaction) -> Self {
        Self { tx }
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(PublisherError::storage)
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(PublisherError::storage)
    }

    // -----------------------------------------------------------------------
    // Documents and editions
    // -----------------------------------------------------------------------

    /// Insert a document. Returns its id.
    pub async fn create_document(&self, slug: &str, kind: EditionKind) -> Result<i64> {
        editions::insert_document(&self.tx, slug, kind).await
    }

    /// Insert an edition with its associations. Returns its id.
    pub async fn insert_edition(&self, edition: &NewEdition) -> Result<i64> {
        editions::insert_edition(&self.tx, edition).await
    }

    pub async fn insert_attachment(&self, edition_id: i64, attachment: &NewAttachment) -> Result<i64> {
        editions::insert_attachment(&self.tx, edition_id, attachment).await
    }

    /// Persist an edition's workflow state and publishing timestamps.
    pub async fn save_edition_state(&self, edition: &Edition) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .tx
            .execute(
                "UPDATE editions SET state = ?1, published_at = ?2, first_published_at = ?3,
                   major_change_published_at = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    edition.state.as_str(),
                    format_timestamp(edition.published_at),
                    format_timestamp(edition.first_published_at),
                    format_timestamp(edition.major_change_published_at),
                    now.as_str(),
                    edition.id,
                ],
            )
            .await
            .map_err(PublisherError::storage)?;
        if changed == 0 {
            return Err(PublisherError::not_found("edition", edition.id));
        }
        Ok(())
    }

    /// Mark every other published edition of the document as superseded.
    /// Returns the ids of the superseded editions.
    pub async fn supersede_published_editions(
        &self,
        document_id: i64,
        except_edition_id: i64,
    ) -> Result<Vec<i64>> {
        let mut rows = self
            .tx
            .query(
                "SELECT id FROM editions WHERE document_id = ?1 AND state = ?2 AND id != ?3",
                params![document_id, EditionState::Published.as_str(), except_edition_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut superseded = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            superseded.push(get_i64(&row, 0)?);
        }
        drop(rows);

        let now = Utc::now().to_rfc3339();
        for id in &superseded {
            self.tx
                .execute(
                    "UPDATE editions SET state = ?1, updated_at = ?2 WHERE id = ?3",
                    params![EditionState::Superseded.as_str(), now.as_str(), *id],
                )
                .await
                .map_err(PublisherError::storage)?;
        }
        Ok(superseded)
    }

    // -----------------------------------------------------------------------
    // Dependency edges
    // -----------------------------------------------------------------------

    pub async fn insert_dependency(&self, edition_id: i64, dependable: Dependable) -> Result<()> {
        dependencies::insert_dependency(&self.tx, edition_id, dependable).await
    }

    pub async fn delete_dependency(&self, edition_id: i64, dependable: Dependable) -> Result<()> {
        dependencies::delete_dependency(&self.tx, edition_id, dependable).await
    }

    /// Remove every edge pointing at `dependable`; returns the affected edition ids.
    pub async fn delete_dependencies_on(&self, dependable: Dependable) -> Result<Vec<i64>> {
        dependencies::delete_dependencies_on(&self.tx, dependable).await
    }

    // -----------------------------------------------------------------------
    // Import bookkeeping
    // -----------------------------------------------------------------------

    pub async fn insert_document_source(
        &self,
        url: &str,
        document_id: i64,
        import_id: Option<&str>,
    ) -> Result<()> {
        imports::insert_document_source(&self.tx, url, document_id, import_id).await
    }

    pub async fn add_collection_membership(&self, collection_id: i64, document_id: i64) -> Result<()> {
        imports::add_collection_membership(&self.tx, collection_id, document_id).await
    }
}
