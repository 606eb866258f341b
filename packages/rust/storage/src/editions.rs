//! Editions, their associations and attachments.

use chrono::Utc;
use libsql::{Connection, params};
use publisher_shared::{Edition, EditionKind, EditionState, PublisherError, Result};

use crate::{
    Storage, format_timestamp, get_i64, get_opt_i64, get_opt_string, get_opt_timestamp,
    get_string, get_timestamp,
};

/// Column list matching [`row_to_edition`].
pub(crate) const EDITION_COLUMNS: &str = "e.id, e.document_id, e.kind, e.state, e.title, e.summary, e.body,
    e.first_published_at, e.major_change_published_at, e.published_at,
    e.primary_mainstream_category_id,
    e.related_mainstream_content_url, e.related_mainstream_content_title,
    e.additional_related_mainstream_content_url, e.additional_related_mainstream_content_title,
    e.alternative_format_provider_id, e.created_at, e.updated_at";

/// Everything needed to create an edition with its associations.
#[derive(Debug, Clone)]
pub struct NewEdition {
    pub document_id: i64,
    pub kind: EditionKind,
    pub state: EditionState,
    pub title: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub first_published_at: Option<chrono::DateTime<Utc>>,
    pub primary_mainstream_category_id: Option<i64>,
    pub related_mainstream_content_url: Option<String>,
    pub related_mainstream_content_title: Option<String>,
    pub additional_related_mainstream_content_url: Option<String>,
    pub additional_related_mainstream_content_title: Option<String>,
    pub alternative_format_provider_id: Option<i64>,
    /// Lead organisations, in display order.
    pub lead_organisation_ids: Vec<i64>,
    pub topic_ids: Vec<i64>,
    /// Mainstream categories other than the primary one.
    pub other_mainstream_category_ids: Vec<i64>,
    pub related_document_ids: Vec<i64>,
}

impl NewEdition {
    /// A draft edition with no associations.
    pub fn new(document_id: i64, kind: EditionKind, title: impl Into<String>) -> Self {
        Self {
            document_id,
            kind,
            state: EditionState::Draft,
            title: title.into(),
            summary: None,
            body: None,
            first_published_at: None,
            primary_mainstream_category_id: None,
            related_mainstream_content_url: None,
            related_mainstream_content_title: None,
            additional_related_mainstream_content_url: None,
            additional_related_mainstream_content_title: None,
            alternative_format_provider_id: None,
            lead_organisation_ids: Vec::new(),
            topic_ids: Vec::new(),
            other_mainstream_category_ids: Vec::new(),
            related_document_ids: Vec::new(),
        }
    }

    pub fn with_state(mut self, state: EditionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A file attachment to insert for an edition.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub title: String,
    pub url: String,
    pub file_path: String,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
}

/// A stored file attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: i64,
    pub edition_id: i64,
    pub title: String,
    pub url: String,
    pub file_path: String,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
}

impl Storage {
    /// Create a document and its first edition outside any transaction.
    /// Returns `(document_id, edition_id)`.
    pub async fn create_document_with_edition(
        &self,
        slug: &str,
        mut edition: NewEdition,
    ) -> Result<(i64, i64)> {
        let tx = self.begin().await?;
        let result = async {
            let document_id = tx.create_document(slug, edition.kind).await?;
            edition.document_id = document_id;
            let edition_id = tx.insert_edition(&edition).await?;
            Ok::<_, PublisherError>((document_id, edition_id))
        }
        .await;

        match result {
            Ok(ids) => {
                tx.commit().await?;
                Ok(ids)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Get an edition by id.
    pub async fn get_edition(&self, id: i64) -> Result<Option<Edition>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {EDITION_COLUMNS} FROM editions e WHERE e.id = ?1"),
                params![id],
            )
            .await
            .map_err(PublisherError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_edition(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PublisherError::storage(e)),
        }
    }

    /// Get an edition by id, failing with `NotFound` when absent.
    pub async fn require_edition(&self, id: i64) -> Result<Edition> {
        self.get_edition(id)
            .await?
            .ok_or_else(|| PublisherError::not_found("edition", id))
    }

    /// All editions of a document, oldest first.
    pub async fn list_editions_for_document(&self, document_id: i64) -> Result<Vec<Edition>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EDITION_COLUMNS} FROM editions e WHERE e.document_id = ?1 ORDER BY e.id"
                ),
                params![document_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_edition(&row)?);
        }
        Ok(results)
    }

    /// Replace an edition's body text.
    pub async fn update_edition_body(&self, edition_id: i64, body: Option<&str>) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE editions SET body = ?1, updated_at = ?2 WHERE id = ?3",
                params![body, now.as_str(), edition_id],
            )
            .await
            .map_err(PublisherError::storage)?;
        if changed == 0 {
            return Err(PublisherError::not_found("edition", edition_id));
        }
        Ok(())
    }

    pub async fn attachments_for_edition(&self, edition_id: i64) -> Result<Vec<Attachment>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, edition_id, title, url, file_path, content_type, file_size
                 FROM attachments WHERE edition_id = ?1 ORDER BY ordering",
                params![edition_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(Attachment {
                id: get_i64(&row, 0)?,
                edition_id: get_i64(&row, 1)?,
                title: get_string(&row, 2)?,
                url: get_string(&row, 3)?,
                file_path: get_string(&row, 4)?,
                content_type: get_opt_string(&row, 5),
                file_size: get_opt_i64(&row, 6),
            });
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Writes shared by `Storage` and `StorageTransaction`
// ---------------------------------------------------------------------------

pub(crate) async fn insert_document(conn: &Connection, slug: &str, kind: EditionKind) -> Result<i64> {
    conn.execute(
        "INSERT INTO documents (slug, kind) VALUES (?1, ?2)",
        params![slug, kind.as_str()],
    )
    .await
    .map_err(PublisherError::storage)?;
    Ok(conn.last_insert_rowid())
}

pub(crate) async fn insert_edition(conn: &Connection, edition: &NewEdition) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO editions (document_id, kind, state, title, summary, body, first_published_at,
            primary_mainstream_category_id, related_mainstream_content_url,
            related_mainstream_content_title, additional_related_mainstream_content_url,
            additional_related_mainstream_content_title, alternative_format_provider_id,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            edition.document_id,
            edition.kind.as_str(),
            edition.state.as_str(),
            edition.title.as_str(),
            edition.summary.as_deref(),
            edition.body.as_deref(),
            format_timestamp(edition.first_published_at),
            edition.primary_mainstream_category_id,
            edition.related_mainstream_content_url.as_deref(),
            edition.related_mainstream_content_title.as_deref(),
            edition.additional_related_mainstream_content_url.as_deref(),
            edition.additional_related_mainstream_content_title.as_deref(),
            edition.alternative_format_provider_id,
            now.as_str(),
            now.as_str(),
        ],
    )
    .await
    .map_err(PublisherError::storage)?;
    let edition_id = conn.last_insert_rowid();

    for (ordering, organisation_id) in edition.lead_organisation_ids.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO edition_organisations (edition_id, organisation_id, lead, ordering)
             VALUES (?1, ?2, 1, ?3)",
            params![edition_id, *organisation_id, ordering as i64],
        )
        .await
        .map_err(PublisherError::storage)?;
    }

    for (ordering, topic_id) in edition.topic_ids.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO edition_topics (edition_id, topic_id, ordering) VALUES (?1, ?2, ?3)",
            params![edition_id, *topic_id, ordering as i64],
        )
        .await
        .map_err(PublisherError::storage)?;
    }

    for (ordering, category_id) in edition.other_mainstream_category_ids.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO edition_mainstream_categories (edition_id, category_id, ordering)
             VALUES (?1, ?2, ?3)",
            params![edition_id, *category_id, ordering as i64],
        )
        .await
        .map_err(PublisherError::storage)?;
    }

    for (ordering, document_id) in edition.related_document_ids.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO edition_related_documents (edition_id, document_id, ordering)
             VALUES (?1, ?2, ?3)",
            params![edition_id, *document_id, ordering as i64],
        )
        .await
        .map_err(PublisherError::storage)?;
    }

    Ok(edition_id)
}

pub(crate) async fn insert_attachment(
    conn: &Connection,
    edition_id: i64,
    attachment: &NewAttachment,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO attachments (edition_id, title, url, file_path, content_type, file_size, ordering)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6,
           (SELECT COUNT(*) FROM attachments WHERE edition_id = ?1))",
        params![
            edition_id,
            attachment.title.as_str(),
            attachment.url.as_str(),
            attachment.file_path.as_str(),
            attachment.content_type.as_deref(),
            attachment.file_size,
        ],
    )
    .await
    .map_err(PublisherError::storage)?;
    Ok(conn.last_insert_rowid())
}

/// Convert a database row selected with [`EDITION_COLUMNS`] to an [`Edition`].
pub(crate) fn row_to_edition(row: &libsql::Row) -> Result<Edition> {
    Ok(Edition {
        id: get_i64(row, 0)?,
        document_id: get_i64(row, 1)?,
        kind: get_string(row, 2)?.parse()?,
        state: get_string(row, 3)?.parse()?,
        title: get_string(row, 4)?,
        summary: get_opt_string(row, 5),
        body: get_opt_string(row, 6),
        first_published_at: get_opt_timestamp(row, 7)?,
        major_change_published_at: get_opt_timestamp(row, 8)?,
        published_at: get_opt_timestamp(row, 9)?,
        primary_mainstream_category_id: get_opt_i64(row, 10),
        related_mainstream_content_url: get_opt_string(row, 11),
        related_mainstream_content_title: get_opt_string(row, 12),
        additional_related_mainstream_content_url: get_opt_string(row, 13),
        additional_related_mainstream_content_title: get_opt_string(row, 14),
        alternative_format_provider_id: get_opt_i64(row, 15),
        created_at: get_timestamp(row, 16)?,
        updated_at: get_timestamp(row, 17)?,
    })
}
