//! Dataset-change detection.
//!
//! A "dataset changed" signal is issued once per successful model load and
//! carries the new catalogue id. The first signal for an id clears every
//! piece of derived state at once; repeats of the same id do nothing.

use crate::catalogue::CatalogueId;
use crate::propagation::PriorIntentCache;
use crate::selection::SelectionStore;
use crate::session::RenderedResult;

/// What a dataset-changed signal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// State was cleared for a new catalogue.
    Applied,
    /// The signal repeated one already applied.
    AlreadyClean,
}

/// Derived state owned by a session and cleared on reset.
pub struct ResetScope<'a> {
    /// Selection sets and evidence states.
    pub selections: &'a mut SelectionStore,
    /// Remembered intent.
    pub cache: &'a mut PriorIntentCache,
    /// Last rendered analysis.
    pub rendered: &'a mut Option<RenderedResult>,
}

impl ResetScope<'_> {
    fn clear(&mut self) {
        self.selections.clear();
        self.cache.clear();
        *self.rendered = None;
    }

    /// Returns true if nothing derived is held.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.selections.is_empty() && self.cache.is_empty() && self.rendered.is_none()
    }
}

/// Applies dataset-changed signals.
#[derive(Debug, Clone, Default)]
pub struct ResetCoordinator {
    applied_for: Option<CatalogueId>,
}

impl ResetCoordinator {
    /// Creates a coordinator that has applied nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { applied_for: None }
    }

    /// Catalogue of the last applied reset.
    #[must_use]
    pub const fn applied_for(&self) -> Option<CatalogueId> {
        self.applied_for
    }

    /// Handles a dataset-changed signal for `catalogue`.
    pub fn dataset_changed(&mut self, catalogue: CatalogueId, mut scope: ResetScope<'_>) -> ResetOutcome {
        if self.applied_for == Some(catalogue) {
            tracing::debug!(catalogue = %catalogue, "dataset-changed signal repeated; ignoring");
            return ResetOutcome::AlreadyClean;
        }
        scope.clear();
        self.applied_for = Some(catalogue);
        tracing::info!(catalogue = %catalogue, "selection state reset for new dataset");
        ResetOutcome::Applied
    }
}
