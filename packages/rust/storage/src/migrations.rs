//! SQL migration definitions for the publisher database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: reference records, documents, editions, associations",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS organisations (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    slug                   TEXT NOT NULL UNIQUE,
    name                   TEXT NOT NULL,
    default_news_image_url TEXT,
    default_news_image_alt TEXT
);

CREATE TABLE IF NOT EXISTS topics (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS mainstream_categories (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    slug       TEXT NOT NULL UNIQUE,
    title      TEXT NOT NULL,
    parent_tag TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS document_collections (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    slug  TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    email TEXT,
    phone TEXT
);

CREATE TABLE IF NOT EXISTS documents (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL,
    kind TEXT NOT NULL,
    UNIQUE(kind, slug)
);

CREATE TABLE IF NOT EXISTS editions (
    id                                         INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id                                INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    kind                                       TEXT NOT NULL,
    state                                      TEXT NOT NULL,
    title                                      TEXT NOT NULL,
    summary                                    TEXT,
    body                                       TEXT,
    first_published_at                         TEXT,
    major_change_published_at                  TEXT,
    published_at                               TEXT,
    primary_mainstream_category_id             INTEGER REFERENCES mainstream_categories(id),
    related_mainstream_content_url             TEXT,
    related_mainstream_content_title           TEXT,
    additional_related_mainstream_content_url  TEXT,
    additional_related_mainstream_content_title TEXT,
    alternative_format_provider_id             INTEGER REFERENCES organisations(id),
    created_at                                 TEXT NOT NULL,
    updated_at                                 TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_editions_document ON editions(document_id);
CREATE INDEX IF NOT EXISTS idx_editions_state ON editions(state);

CREATE TABLE IF NOT EXISTS edition_organisations (
    edition_id      INTEGER NOT NULL REFERENCES editions(id) ON DELETE CASCADE,
    organisation_id INTEGER NOT NULL REFERENCES organisations(id),
    lead            INTEGER NOT NULL DEFAULT 1,
    ordering        INTEGER NOT NULL,
    PRIMARY KEY (edition_id, organisation_id)
);

CREATE TABLE IF NOT EXISTS edition_topics (
    edition_id INTEGER NOT NULL REFERENCES editions(id) ON DELETE CASCADE,
    topic_id   INTEGER NOT NULL REFERENCES topics(id),
    ordering   INTEGER NOT NULL,
    PRIMARY KEY (edition_id, topic_id)
);

CREATE TABLE IF NOT EXISTS edition_mainstream_categories (
    edition_id  INTEGER NOT NULL REFERENCES editions(id) ON DELETE CASCADE,
    category_id INTEGER NOT NULL REFERENCES mainstream_categories(id),
    ordering    INTEGER NOT NULL,
    PRIMARY KEY (edition_id, category_id)
);

CREATE TABLE IF NOT EXISTS edition_related_documents (
    edition_id  INTEGER NOT NULL REFERENCES editions(id) ON DELETE CASCADE,
    document_id INTEGER NOT NULL REFERENCES documents(id),
    ordering    INTEGER NOT NULL,
    PRIMARY KEY (edition_id, document_id)
);

CREATE TABLE IF NOT EXISTS document_collection_memberships (
    collection_id INTEGER NOT NULL REFERENCES document_collections(id) ON DELETE CASCADE,
    document_id   INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    PRIMARY KEY (collection_id, document_id)
);

CREATE TABLE IF NOT EXISTS attachments (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    edition_id   INTEGER NOT NULL REFERENCES editions(id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    url          TEXT NOT NULL,
    file_path    TEXT NOT NULL,
    content_type TEXT,
    file_size    INTEGER,
    ordering     INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attachments_edition ON attachments(edition_id);

CREATE TABLE IF NOT EXISTS images (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    edition_id INTEGER NOT NULL REFERENCES editions(id) ON DELETE CASCADE,
    url        TEXT NOT NULL,
    alt_text   TEXT NOT NULL,
    caption    TEXT,
    ordering   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_images_edition ON images(edition_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Edition dependency graph",
            sql: r#"
CREATE TABLE IF NOT EXISTS edition_dependencies (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    edition_id      INTEGER NOT NULL REFERENCES editions(id) ON DELETE CASCADE,
    dependable_type TEXT NOT NULL,
    dependable_id   INTEGER NOT NULL,
    UNIQUE(edition_id, dependable_type, dependable_id)
);

CREATE INDEX IF NOT EXISTS idx_edition_dependencies_dependable
    ON edition_dependencies(dependable_type, dependable_id);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
        Migration {
            version: 3,
            description: "Import runs, per-row errors and legacy URL mapping",
            sql: r#"
CREATE TABLE IF NOT EXISTS imports (
    id          TEXT PRIMARY KEY,
    source_file TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE TABLE IF NOT EXISTS import_errors (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    import_id   TEXT NOT NULL REFERENCES imports(id) ON DELETE CASCADE,
    line_number INTEGER NOT NULL,
    message     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_import_errors_import ON import_errors(import_id);

CREATE TABLE IF NOT EXISTS document_sources (
    url         TEXT PRIMARY KEY,
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    import_id   TEXT REFERENCES imports(id)
);

INSERT INTO schema_migrations (version) VALUES (3);
"#,
        },
    ]
}
