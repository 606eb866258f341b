//! Download-once cache for attachment files referenced by import rows.
//!
//! Files are stored under `<cache_dir>/<sha256(url)>/<filename>`. A URL whose
//! directory already holds a file is served from disk without a request.
//! Downloads land under a dot-prefixed partial name and are renamed into
//! place once fully written, so an interrupted write is never a cache hit.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use url::Url;

use publisher_shared::{AttachmentCacheConfig, PublisherError, Result};

/// Prefix of in-progress downloads; cached names never start with a dot.
const PARTIAL_PREFIX: &str = ".partial-";

/// User-Agent string for attachment requests.
const USER_AGENT: &str = concat!("publisher-uploader/", env!("CARGO_PKG_VERSION"));

/// Content types we know a file extension for.
const EXTENSIONS: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    ("text/csv", "csv"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    ("application/vnd.ms-excel", "xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    ("application/rtf", "rtf"),
    ("text/plain", "txt"),
    ("application/vnd.oasis.opendocument.text", "odt"),
    ("application/vnd.oasis.opendocument.spreadsheet", "ods"),
];

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// A fetched attachment file on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSource {
    /// The URL the file was fetched from.
    pub url: String,
    pub path: PathBuf,
    pub content_type: Option<String>,
    pub file_size: u64,
}

/// A titled attachment ready to be stored against an edition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub title: String,
    pub source: AttachmentSource,
}

/// Retrieves attachment files for import rows.
///
/// Failures are returned as [`PublisherError::AttachmentRetrieval`] carrying
/// the URL and the row's line number.
#[allow(async_fn_in_trait)]
pub trait AttachmentFetcher {
    async fn fetch(&self, url: &str, line_number: usize) -> Result<AttachmentSource>;
}

impl<F: AttachmentFetcher + ?Sized> AttachmentFetcher for &F {
    async fn fetch(&self, url: &str, line_number: usize) -> Result<AttachmentSource> {
        (**self).fetch(url, line_number).await
    }
}

// ---------------------------------------------------------------------------
// AttachmentCache
// ---------------------------------------------------------------------------

/// HTTP-backed [`AttachmentFetcher`] with an on-disk cache.
pub struct AttachmentCache {
    config: AttachmentCacheConfig,
    client: Client,
}

impl AttachmentCache {
    pub fn new(config: AttachmentCacheConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout)
            .build()
            .map_err(|e| PublisherError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    /// Directory holding the cached copy of `url`.
    fn entry_dir(&self, url: &Url) -> PathBuf {
        self.config.cache_dir.join(compute_hash(url.as_str()))
    }

    async fn download(&self, url: &Url, line_number: usize) -> Result<AttachmentSource> {
        let fail = |message: String| PublisherError::attachment(url.as_str(), line_number, message);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fail(format!("body read failed: {e}")))?;

        let dir = self.entry_dir(url);
        let name = file_name_for(url, content_type.as_deref());
        let path = dir.join(&name);
        let partial = dir.join(format!("{PARTIAL_PREFIX}{name}"));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| fail(format!("cannot create {}: {e}", dir.display())))?;
        if let Err(e) = tokio::fs::write(&partial, &bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(fail(format!("cannot write {}: {e}", partial.display())));
        }
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| fail(format!("cannot move {} into place: {e}", path.display())))?;

        info!(path = %path.display(), bytes = bytes.len(), "attachment downloaded");

        Ok(AttachmentSource {
            url: url.to_string(),
            path,
            content_type,
            file_size: bytes.len() as u64,
        })
    }
}

impl AttachmentFetcher for AttachmentCache {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str, line_number: usize) -> Result<AttachmentSource> {
        let parsed = Url::parse(url)
            .map_err(|e| PublisherError::attachment(url, line_number, format!("invalid URL: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PublisherError::attachment(
                url,
                line_number,
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        if let Some(cached) = cached_file(&self.entry_dir(&parsed)).await {
            debug!(path = %cached.display(), "attachment cache hit");
            let file_size = tokio::fs::metadata(&cached)
                .await
                .map(|m| m.len())
                .map_err(|e| PublisherError::attachment(url, line_number, e.to_string()))?;
            return Ok(AttachmentSource {
                url: url.to_string(),
                content_type: content_type_for(&cached).map(str::to_string),
                path: cached,
                file_size,
            });
        }

        self.download(&parsed, line_number).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The file already cached in `dir`, if any. Partial downloads are skipped.
async fn cached_file(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            return Some(entry.path());
        }
    }
    None
}

/// Filesystem-safe name from the last URL path segment, with an extension
/// derived from the content type when the segment has none.
fn file_name_for(url: &Url, content_type: Option<&str>) -> String {
    static UNSAFE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid filename regex"));

    let segment = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default();
    let mut name = UNSAFE_RE.replace_all(segment, "_").trim_matches('.').to_string();
    if name.is_empty() {
        name = "attachment".to_string();
    }

    if Path::new(&name).extension().is_none() {
        if let Some(ext) = content_type.and_then(extension_for) {
            name = format!("{name}.{ext}");
        }
    }
    name
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
}

fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(_, known)| *known == ext)
        .map(|(mime, _)| *mime)
}

/// Compute SHA-256 hash of a cache key.
fn compute_hash(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
