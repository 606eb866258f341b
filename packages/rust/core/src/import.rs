//! Batch import of detailed guides from a CSV file.
//!
//! Headings are validated once for the whole file. Rows are then imported
//! one at a time in file order, each in its own transaction. A failing row
//! is recorded and skipped unless the run is configured to stop.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{info, instrument, warn};

use publisher_shared::{EditionKind, EditionState, ImportConfig, PublisherError, Result};
use publisher_storage::{ImportRowError, NewAttachment, NewEdition, Storage, StorageTransaction};
use publisher_uploader::{
    AttachmentFetcher, DetailedGuideAttributes, DetailedGuideRow, RecordingRowLogger, RowLogger,
    RowWarning, SlugLookup, heading_validation_errors,
};

/// Result of an import run.
#[derive(Debug)]
pub struct ImportResult {
    pub import_id: String,
    pub imported: usize,
    pub failed: usize,
    /// Non-fatal problems of imported rows, such as slugs that matched nothing.
    pub warnings: Vec<RowWarning>,
    /// Rows that were not imported, with the reason.
    pub errors: Vec<ImportRowError>,
    pub elapsed: Duration,
}

/// Progress callback for reporting import status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a row has been committed.
    fn row_imported(&self, line_number: usize, title: &str);
    /// Called after a row has been rejected.
    fn row_failed(&self, line_number: usize, message: &str);
    /// Called when the run completes.
    fn done(&self, result: &ImportResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn row_imported(&self, _line_number: usize, _title: &str) {}
    fn row_failed(&self, _line_number: usize, _message: &str) {}
    fn done(&self, _result: &ImportResult) {}
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

fn csv_error(path: &Path, e: csv::Error) -> PublisherError {
    PublisherError::parse(format!("{}: {e}", path.display()))
}

/// Heading row of a CSV file, trimmed.
pub fn read_headings(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let headings = reader.headers().map_err(|e| csv_error(path, e))?;
    Ok(headings.iter().map(|h| h.trim().to_string()).collect())
}

/// Heading problems of a detailed guide CSV file; empty when it is valid.
pub fn validate_headings(path: &Path) -> Result<Vec<String>> {
    Ok(heading_validation_errors(&read_headings(path)?))
}

// ---------------------------------------------------------------------------
// Import driver
// ---------------------------------------------------------------------------

/// Import every row of `config.csv_path` as an `imported` detailed guide.
#[instrument(skip_all, fields(csv = %config.csv_path.display()))]
pub async fn import_detailed_guides<F: AttachmentFetcher>(
    config: &ImportConfig,
    storage: &Storage,
    fetcher: &F,
    progress: &dyn ProgressReporter,
) -> Result<ImportResult> {
    let start = Instant::now();
    let path = config.csv_path.as_path();

    progress.phase("Validating headings");
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let headings: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let heading_errors = heading_validation_errors(&headings);
    if !heading_errors.is_empty() {
        return Err(PublisherError::validation(heading_errors.join("; ")));
    }

    let default_organisation = storage
        .find_organisation_by_slug(&config.default_organisation)
        .await?
        .ok_or_else(|| {
            PublisherError::config(format!(
                "default organisation '{}' does not exist",
                config.default_organisation
            ))
        })?;

    let import_id = storage.insert_import(&path.display().to_string()).await?;
    info!(%import_id, "import started");

    progress.phase("Importing rows");
    let mut imported = 0usize;
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    for (index, record) in reader.records().enumerate() {
        // The heading row is line 1.
        let fallback_line = index + 2;
        // Warnings of a row that fails are logged but not kept.
        let logger = RecordingRowLogger::new();
        let outcome = match record {
            Ok(record) => {
                let line_number = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                let data: HashMap<String, String> = headings
                    .iter()
                    .cloned()
                    .zip(record.iter().map(str::to_string))
                    .collect();
                let row = DetailedGuideRow::new(
                    data,
                    line_number,
                    fetcher,
                    default_organisation.clone(),
                    &logger,
                    storage,
                );
                (line_number, import_row(storage, &row, &logger, &import_id).await)
            }
            Err(e) => (fallback_line, Err(csv_error(path, e))),
        };

        match outcome {
            (line_number, Ok(title)) => {
                imported += 1;
                warnings.extend(logger.take());
                progress.row_imported(line_number, &title);
            }
            (line_number, Err(e)) => {
                let message = e.to_string();
                warn!(line = line_number, error = %message, "row not imported");
                storage
                    .record_import_error(&import_id, line_number, &message)
                    .await?;
                progress.row_failed(line_number, &message);
                errors.push(ImportRowError {
                    line_number,
                    message,
                });
                if config.stop_on_row_error {
                    warn!("stopping at first failed row");
                    break;
                }
            }
        }
    }

    let result = ImportResult {
        import_id,
        imported,
        failed: errors.len(),
        warnings,
        errors,
        elapsed: start.elapsed(),
    };

    let stats = json!({
        "imported": result.imported,
        "failed": result.failed,
        "warnings": result.warnings.len(),
        "elapsed_ms": result.elapsed.as_millis() as u64,
    });
    storage
        .finish_import(&result.import_id, &stats.to_string())
        .await?;

    info!(
        imported = result.imported,
        failed = result.failed,
        warnings = result.warnings.len(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "import finished"
    );
    progress.done(&result);
    Ok(result)
}

/// Import one row. Returns the new edition's title.
async fn import_row<F, G, L>(
    storage: &Storage,
    row: &DetailedGuideRow<F, G, L>,
    logger: &RecordingRowLogger,
    import_id: &str,
) -> Result<String>
where
    F: AttachmentFetcher,
    G: RowLogger,
    L: SlugLookup,
{
    let legacy_url = row
        .legacy_url()
        .ok_or_else(|| PublisherError::validation("old_url is blank"))?;
    if storage.find_document_source(legacy_url).await?.is_some() {
        return Err(PublisherError::validation(format!(
            "{legacy_url} has already been imported"
        )));
    }
    if row.title().is_empty() {
        return Err(PublisherError::validation("title is blank"));
    }

    let attributes = row.attributes().await?;

    let mut collection_ids = Vec::new();
    for slug in row.document_collections() {
        match storage.find_document_collection_by_slug(slug).await? {
            Some(collection) => collection_ids.push(collection.id),
            None => logger.warn(
                row.line_number(),
                &format!("unable to find document collection with slug '{slug}'"),
            ),
        }
    }

    let slug = unique_slug(storage, &attributes.title).await?;

    let tx = storage.begin().await?;
    let result = write_row(&tx, &slug, &attributes, &collection_ids, legacy_url, import_id).await;
    crate::settle(tx, result).await?;

    Ok(attributes.title)
}

async fn write_row(
    tx: &StorageTransaction,
    slug: &str,
    attributes: &DetailedGuideAttributes,
    collection_ids: &[i64],
    legacy_url: &str,
    import_id: &str,
) -> Result<()> {
    let document_id = tx.create_document(slug, EditionKind::DetailedGuide).await?;
    let edition_id = tx
        .insert_edition(&new_edition(document_id, attributes))
        .await?;

    for attachment in &attributes.attachments {
        tx.insert_attachment(
            edition_id,
            &NewAttachment {
                title: attachment.title.clone(),
                url: attachment.source.url.clone(),
                file_path: attachment.source.path.display().to_string(),
                content_type: attachment.source.content_type.clone(),
                file_size: i64::try_from(attachment.source.file_size).ok(),
            },
        )
        .await?;
    }
    for collection_id in collection_ids {
        tx.add_collection_membership(*collection_id, document_id)
            .await?;
    }
    tx.insert_document_source(legacy_url, document_id, Some(import_id))
        .await?;
    Ok(())
}

fn new_edition(document_id: i64, attributes: &DetailedGuideAttributes) -> NewEdition {
    NewEdition {
        document_id,
        kind: EditionKind::DetailedGuide,
        state: EditionState::Imported,
        title: attributes.title.clone(),
        summary: attributes.summary.clone(),
        body: attributes.body.clone(),
        first_published_at: attributes.first_published_at,
        primary_mainstream_category_id: attributes
            .primary_mainstream_category
            .as_ref()
            .map(|c| c.id),
        related_mainstream_content_url: attributes.related_mainstream_content_url.clone(),
        related_mainstream_content_title: attributes.related_mainstream_content_title.clone(),
        additional_related_mainstream_content_url: attributes
            .additional_related_mainstream_content_url
            .clone(),
        additional_related_mainstream_content_title: attributes
            .additional_related_mainstream_content_title
            .clone(),
        alternative_format_provider_id: attributes
            .alternative_format_provider
            .as_ref()
            .map(|o| o.id),
        lead_organisation_ids: attributes.lead_organisations.iter().map(|o| o.id).collect(),
        topic_ids: attributes.topics.iter().map(|t| t.id).collect(),
        other_mainstream_category_ids: attributes
            .other_mainstream_categories
            .iter()
            .map(|c| c.id)
            .collect(),
        related_document_ids: attributes.related_documents.iter().map(|d| d.id).collect(),
    }
}

/// Generate a URL-safe slug from a title.
pub(crate) fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// A detailed guide slug for `title` that no document uses yet.
async fn unique_slug(storage: &Storage, title: &str) -> Result<String> {
    let mut base = slugify(title);
    if base.is_empty() {
        base = "detailed-guide".to_string();
    }

    let mut candidate = base.clone();
    let mut suffix = 2;
    while storage
        .document_slug_exists(EditionKind::DetailedGuide, &candidate)
        .await?
    {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}
