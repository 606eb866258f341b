//! Edition workflow transitions.
//!
//! [`EditionServices`] is built once with the storage it works against and
//! hands out one [`EditionService`] per edition and transition. Each
//! transition saves the edition's new state, supersedes older published
//! editions where relevant, and reconciles dependencies, all in one
//! transaction.

use chrono::Utc;
use tracing::{info, instrument, warn};

use publisher_shared::{Edition, EditionState, Result};
use publisher_storage::{Storage, StorageTransaction};

use crate::dependencies::{EditionDependenciesPopulator, Reconciliation};

/// A workflow transition an [`EditionService`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Publish,
    ForcePublish,
    Withdraw,
}

impl Transition {
    /// States the transition may start from.
    pub fn allowed_from(self) -> &'static [EditionState] {
        match self {
            Self::Publish => &[EditionState::Submitted],
            Self::ForcePublish => &[
                EditionState::Imported,
                EditionState::Draft,
                EditionState::Submitted,
            ],
            Self::Withdraw => &[EditionState::Published],
        }
    }

    pub fn target_state(self) -> EditionState {
        match self {
            Self::Publish | Self::ForcePublish => EditionState::Published,
            Self::Withdraw => EditionState::Withdrawn,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Publish => "published",
            Self::ForcePublish => "force published",
            Self::Withdraw => "withdrawn",
        }
    }
}

/// Factory for edition transitions.
#[derive(Clone, Copy)]
pub struct EditionServices<'a> {
    storage: &'a Storage,
    populator: EditionDependenciesPopulator<'a>,
}

impl<'a> EditionServices<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self::with_populator(storage, EditionDependenciesPopulator::new(storage))
    }

    pub fn with_populator(storage: &'a Storage, populator: EditionDependenciesPopulator<'a>) -> Self {
        Self { storage, populator }
    }

    pub fn publisher(&self, edition: Edition) -> EditionService<'a> {
        self.service(edition, Transition::Publish)
    }

    pub fn force_publisher(&self, edition: Edition) -> EditionService<'a> {
        self.service(edition, Transition::ForcePublish)
    }

    pub fn withdrawer(&self, edition: Edition) -> EditionService<'a> {
        self.service(edition, Transition::Withdraw)
    }

    pub fn service(&self, edition: Edition, transition: Transition) -> EditionService<'a> {
        EditionService {
            storage: self.storage,
            populator: self.populator,
            edition,
            transition,
            failure: None,
            reconciliation: None,
        }
    }
}

/// One transition of one edition.
pub struct EditionService<'a> {
    storage: &'a Storage,
    populator: EditionDependenciesPopulator<'a>,
    edition: Edition,
    transition: Transition,
    failure: Option<String>,
    reconciliation: Option<Reconciliation>,
}

impl EditionService<'_> {
    pub fn edition(&self) -> &Edition {
        &self.edition
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    /// Why the last [`perform`](Self::perform) returned `false`.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Dependency changes made by a successful perform.
    pub fn reconciliation(&self) -> Option<&Reconciliation> {
        self.reconciliation.as_ref()
    }

    pub fn can_perform(&self) -> bool {
        self.transition.allowed_from().contains(&self.edition.state)
    }

    /// Run the transition. Returns `false` when nothing was committed; see
    /// [`failure_reason`](Self::failure_reason).
    #[instrument(skip_all, fields(edition_id = self.edition.id, transition = ?self.transition))]
    pub async fn perform(&mut self) -> bool {
        self.failure = None;

        if !self.can_perform() {
            let reason = format!(
                "a {} edition cannot be {}",
                self.edition.state,
                self.transition.verb()
            );
            warn!(%reason, "transition refused");
            self.failure = Some(reason);
            return false;
        }

        let mut edition = self.edition.clone();
        match self.execute(&mut edition).await {
            Ok(reconciliation) => {
                info!(
                    state = %edition.state,
                    cleared_dependents = ?reconciliation.cleared_dependents,
                    "edition {}",
                    self.transition.verb()
                );
                self.edition = edition;
                self.reconciliation = Some(reconciliation);
                true
            }
            Err(e) => {
                warn!(error = %e, "transition failed");
                self.failure = Some(e.to_string());
                false
            }
        }
    }

    async fn execute(&self, edition: &mut Edition) -> Result<Reconciliation> {
        let tx = self.storage.begin().await?;
        let result = self.write(&tx, edition).await;
        crate::settle(tx, result).await
    }

    async fn write(&self, tx: &StorageTransaction, edition: &mut Edition) -> Result<Reconciliation> {
        let now = Utc::now();
        edition.state = self.transition.target_state();

        if edition.state == EditionState::Published {
            edition.published_at = Some(now);
            edition.first_published_at.get_or_insert(now);
            edition.major_change_published_at.get_or_insert(now);
        }
        tx.save_edition_state(edition).await?;

        if edition.state == EditionState::Published {
            let superseded = tx
                .supersede_published_editions(edition.document_id, edition.id)
                .await?;
            if !superseded.is_empty() {
                info!(?superseded, "previous editions superseded");
            }
            for superseded_id in superseded {
                self.populator.retire(tx, superseded_id).await?;
            }
        }

        self.populator.apply(tx, edition).await
    }
}
