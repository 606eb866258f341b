//! Shared types, error model, and configuration for the publisher.
//!
//! This crate is the foundation depended on by all other publisher crates.
//! It provides:
//! - [`PublisherError`], the unified error type
//! - Domain types ([`Edition`], [`Document`], [`Contact`], [`Dependable`], ...)
//! - Configuration ([`AppConfig`], [`AttachmentCacheConfig`], [`ImportConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AttachmentCacheConfig, AttachmentsConfig, DefaultsConfig, ImportConfig,
    ImportPolicyConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PublisherError, Result};
pub use types::{
    Contact, Dependable, DependableType, Document, DocumentCollection, Edition, EditionKind,
    EditionState, Image, MainstreamCategory, Organisation, Topic,
};
