//! Constraint propagation over the three selection sets.
//!
//! Evidence is chosen from the whole catalogue. Target is offered the
//! catalogue minus Evidence, and R the catalogue minus Evidence and Target.
//! Propagation recomputes those pools after every edit and decides which
//! remembered members are re-offered as checked.
//!
//! The remembered membership lives in a [`PriorIntentCache`]: the settled
//! checked set plus members that were pushed out only because a
//! higher-priority set claimed them. When such a member is freed again it is
//! restored, e.g. a Target variable moved into Evidence and back returns to
//! Target. Members the user unchecks are forgotten, and any explicit edit of
//! a set replaces its remembered intent with exactly the new choice.

use crate::catalogue::{ModelCatalogue, VariableId};
use crate::config::PoolOrder;
use crate::error::SelectionField;
use crate::selection::{SelectionSet, SelectionStore};

/// A user edit to one selection set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEdit {
    /// New Evidence membership (states are handled by the store).
    Evidence(SelectionSet),
    /// New Target membership.
    Target(SelectionSet),
    /// New R membership.
    R(SelectionSet),
    /// No edit; recompute from the current state.
    Refresh,
}

impl SelectionEdit {
    /// The field this edit touches, if any.
    #[must_use]
    pub const fn field(&self) -> Option<SelectionField> {
        match self {
            Self::Evidence(_) => Some(SelectionField::Evidence),
            Self::Target(_) => Some(SelectionField::Target),
            Self::R(_) => Some(SelectionField::R),
            Self::Refresh => None,
        }
    }
}

/// Last observed membership and remembered intent, per selection set.
///
/// Advisory only: it decides what is re-offered as checked and never
/// overrides exclusivity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorIntentCache {
    evidence: SelectionSet,
    target: SelectionSet,
    target_intent: SelectionSet,
    r_intent: SelectionSet,
}

impl PriorIntentCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evidence membership seen by the last propagation.
    #[must_use]
    pub const fn last_evidence(&self) -> &SelectionSet {
        &self.evidence
    }

    /// Target membership seen by the last propagation.
    #[must_use]
    pub const fn last_target(&self) -> &SelectionSet {
        &self.target
    }

    /// Remembered Target intent.
    #[must_use]
    pub const fn target_intent(&self) -> &SelectionSet {
        &self.target_intent
    }

    /// Remembered R intent.
    #[must_use]
    pub const fn r_intent(&self) -> &SelectionSet {
        &self.r_intent
    }

    /// Returns true if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty()
            && self.target.is_empty()
            && self.target_intent.is_empty()
            && self.r_intent.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.evidence.clear();
        self.target.clear();
        self.target_intent.clear();
        self.r_intent.clear();
    }
}

/// Settled result of one propagation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Evidence membership.
    pub evidence: SelectionSet,
    /// Variables offered for Target.
    pub target_pool: Vec<VariableId>,
    /// Checked Target members.
    pub target: SelectionSet,
    /// Variables offered for R.
    pub r_pool: Vec<VariableId>,
    /// Checked R members.
    pub r: SelectionSet,
}

impl Propagation {
    /// Returns true if the checked sets are pairwise disjoint.
    #[must_use]
    pub fn is_disjoint(&self) -> bool {
        self.evidence.is_disjoint(&self.target)
            && self.evidence.is_disjoint(&self.r)
            && self.target.is_disjoint(&self.r)
    }
}

/// Recomputes pools and pre-checked members.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintPropagator {
    order: PoolOrder,
}

impl ConstraintPropagator {
    /// Creates a propagator that orders pools as given.
    #[must_use]
    pub const fn new(order: PoolOrder) -> Self {
        Self { order }
    }

    /// Applies `edit` on top of `current` and settles all three sets.
    ///
    /// Never fails: identifiers outside the catalogue are dropped silently,
    /// and without a catalogue every pool is empty.
    pub fn propagate(
        &self,
        catalogue: Option<&ModelCatalogue>,
        current: &SelectionStore,
        edit: SelectionEdit,
        cache: &mut PriorIntentCache,
    ) -> Propagation {
        let Some(catalogue) = catalogue else {
            cache.clear();
            return Propagation::default();
        };
        let in_universe = |id: &VariableId| catalogue.contains(id);

        let evidence: SelectionSet = match &edit {
            SelectionEdit::Evidence(requested) => {
                requested.iter().filter(|id| in_universe(*id)).cloned().collect()
            }
            _ => current
                .evidence()
                .variables()
                .into_iter()
                .filter(|id| in_universe(id))
                .collect(),
        };

        // Target: universe - evidence.
        // An explicit edit replaces the remembered intent outright.
        if let SelectionEdit::Target(requested) = &edit {
            cache.target_intent = requested
                .iter()
                .filter(|id| in_universe(*id) && !evidence.contains(*id))
                .cloned()
                .collect();
        }
        let freed_from_evidence: SelectionSet = cache.evidence.difference(&evidence).cloned().collect();
        let target = retain_intent(&cache.target_intent, &freed_from_evidence, |id| {
            in_universe(id) && !evidence.contains(id)
        });

        // R: universe - evidence - target.
        let excluded_r: SelectionSet = evidence.union(&target).cloned().collect();
        if let SelectionEdit::R(requested) = &edit {
            cache.r_intent = requested
                .iter()
                .filter(|id| in_universe(*id) && !excluded_r.contains(*id))
                .cloned()
                .collect();
        }
        let previously_excluded_r: SelectionSet = cache.evidence.union(&cache.target).cloned().collect();
        let freed_for_r: SelectionSet = previously_excluded_r.difference(&excluded_r).cloned().collect();
        let r = retain_intent(&cache.r_intent, &freed_for_r, |id| {
            in_universe(id) && !excluded_r.contains(id)
        });

        let target_pool = self.pool(catalogue, |id| !evidence.contains(id));
        let r_pool = self.pool(catalogue, |id| !excluded_r.contains(id));

        // Remember the settled membership plus members displaced by a
        // higher-priority set; drop anything unchecked or unknown.
        cache.target_intent = target
            .iter()
            .chain(cache.target_intent.intersection(&evidence))
            .cloned()
            .collect();
        cache.r_intent = r
            .iter()
            .chain(cache.r_intent.intersection(&excluded_r))
            .cloned()
            .collect();
        cache.evidence.clone_from(&evidence);
        cache.target.clone_from(&target);

        tracing::debug!(
            evidence = evidence.len(),
            target = target.len(),
            r = r.len(),
            target_pool = target_pool.len(),
            r_pool = r_pool.len(),
            "selection propagated"
        );

        Propagation {
            evidence,
            target_pool,
            target,
            r_pool,
            r,
        }
    }

    fn pool(&self, catalogue: &ModelCatalogue, eligible: impl Fn(&VariableId) -> bool) -> Vec<VariableId> {
        let mut pool: Vec<VariableId> = catalogue.variable_ids().filter(|id| eligible(*id)).cloned().collect();
        if self.order == PoolOrder::Alphabetical {
            pool.sort();
        }
        pool
    }
}

/// `(intent ∩ available) ∪ (freed ∩ intent)`, both restricted to `available`.
fn retain_intent(
    intent: &SelectionSet,
    freed: &SelectionSet,
    available: impl Fn(&VariableId) -> bool,
) -> SelectionSet {
    let kept = intent.iter().filter(|id| available(*id));
    let restored = freed
        .intersection(intent)
        .filter(|id| available(*id));
    kept.chain(restored).cloned().collect()
}
