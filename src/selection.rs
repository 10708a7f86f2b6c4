//! Selection store: Evidence (with assigned states), Target and R.
//!
//! The store is mutated only by the session after propagation has settled,
//! so observers always see the three sets pairwise disjoint and confined to
//! the current catalogue.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalogue::{ModelCatalogue, Variable, VariableId};
use crate::error::{SelectionField, ValidationError};

/// A set of variable identifiers.
pub type SelectionSet = BTreeSet<VariableId>;

/// Evidence variables and their chosen states.
///
/// The key set is the Evidence selection, so an Evidence member can never
/// lack an assignment and an assignment can never outlive its member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceAssignment(BTreeMap<VariableId, String>);

impl EvidenceAssignment {
    /// Creates an empty assignment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an assignment from `(variable, state)` pairs without checking
    /// them against any catalogue.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<VariableId>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// State assigned to `variable`.
    #[must_use]
    pub fn get(&self, variable: &VariableId) -> Option<&str> {
        self.0.get(variable).map(String::as_str)
    }

    /// Returns true if `variable` is evidence.
    #[must_use]
    pub fn contains(&self, variable: &VariableId) -> bool {
        self.0.contains_key(variable)
    }

    /// The Evidence selection set.
    #[must_use]
    pub fn variables(&self) -> SelectionSet {
        self.0.keys().cloned().collect()
    }

    /// Iterates `(variable, state)` pairs in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&VariableId, &str)> {
        self.0.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Number of evidence variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there is no evidence.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Makes the key set equal to `members`.
    ///
    /// New members default to their variable's first state; members that
    /// stay keep their current state; identifiers missing from the catalogue
    /// are dropped.
    pub(crate) fn sync(&mut self, catalogue: &ModelCatalogue, members: &SelectionSet) {
        self.0.retain(|k, _| members.contains(k) && catalogue.contains(k));
        for id in members {
            if self.0.contains_key(id) {
                continue;
            }
            if let Some(state) = catalogue.get(id).and_then(Variable::first_state) {
                self.0.insert(id.clone(), state.to_string());
            }
        }
    }

    pub(crate) fn overwrite(&mut self, variable: &VariableId, value: String) {
        if let Some(slot) = self.0.get_mut(variable) {
            *slot = value;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

/// The three selection sets of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionStore {
    evidence: EvidenceAssignment,
    target: SelectionSet,
    r: SelectionSet,
}

impl SelectionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from raw parts with no propagation applied.
    ///
    /// Used to hand arbitrary state to the assembler; sessions never build
    /// their store this way.
    #[must_use]
    pub fn from_parts(evidence: EvidenceAssignment, target: SelectionSet, r: SelectionSet) -> Self {
        Self { evidence, target, r }
    }

    /// Evidence assignment.
    #[must_use]
    pub const fn evidence(&self) -> &EvidenceAssignment {
        &self.evidence
    }

    /// Target selection.
    #[must_use]
    pub const fn target(&self) -> &SelectionSet {
        &self.target
    }

    /// R selection.
    #[must_use]
    pub const fn r(&self) -> &SelectionSet {
        &self.r
    }

    /// The set for `field`.
    #[must_use]
    pub fn set(&self, field: SelectionField) -> SelectionSet {
        match field {
            SelectionField::Evidence => self.evidence.variables(),
            SelectionField::Target => self.target.clone(),
            SelectionField::R => self.r.clone(),
        }
    }

    /// Returns true if all three sets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty() && self.target.is_empty() && self.r.is_empty()
    }

    /// Sets the state of an Evidence variable.
    ///
    /// The previous state is retained on error.
    ///
    /// # Errors
    /// - `UnknownVariable` if `variable` is not currently evidence
    /// - `InvalidEvidenceValue` if `value` is not one of its states
    pub fn set_evidence_value(
        &mut self,
        catalogue: &ModelCatalogue,
        variable: &VariableId,
        value: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let value = value.into();
        let var = match catalogue.get(variable) {
            Some(var) if self.evidence.contains(variable) => var,
            _ => {
                return Err(ValidationError::UnknownVariable {
                    field: SelectionField::Evidence,
                    variable: variable.clone(),
                })
            }
        };
        if !var.has_state(&value) {
            return Err(ValidationError::InvalidEvidenceValue {
                variable: variable.clone(),
                value,
            });
        }
        self.evidence.overwrite(variable, value);
        Ok(())
    }

    pub(crate) fn sync_evidence(&mut self, catalogue: &ModelCatalogue, members: &SelectionSet) {
        self.evidence.sync(catalogue, members);
    }

    pub(crate) fn replace_target(&mut self, target: SelectionSet) {
        self.target = target;
    }

    pub(crate) fn replace_r(&mut self, r: SelectionSet) {
        self.r = r;
    }

    pub(crate) fn clear(&mut self) {
        self.evidence.clear();
        self.target.clear();
        self.r.clear();
    }
}
