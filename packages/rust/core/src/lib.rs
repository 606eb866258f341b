//! Domain logic for the publisher backend.
//!
//! This crate ties together reference extraction, storage and the CSV row
//! reader into end-to-end workflows: edition state transitions with their
//! dependency reconciliation, and detailed guide imports.

pub mod dependencies;
pub mod import;
pub mod lead_image;
pub mod resolvers;
pub mod services;

pub use dependencies::{DependencyDiff, EditionDependenciesPopulator, Reconciliation, diff_dependencies};
pub use import::{
    ImportResult, ProgressReporter, SilentProgress, import_detailed_guides, read_headings,
    validate_headings,
};
pub use lead_image::LeadImage;
pub use resolvers::{ContactResolver, EditionResolver};
pub use services::{EditionService, EditionServices, Transition};

use publisher_shared::Result;
use publisher_storage::StorageTransaction;
use tracing::warn;

/// Commit `tx` when `result` is Ok, roll it back otherwise.
pub(crate) async fn settle<T>(tx: StorageTransaction, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use publisher_storage::Storage;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    pub(crate) async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("publisher_core_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }
}
