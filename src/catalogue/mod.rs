//! Model catalogue: the universe of selectable variables.
//!
//! A `ModelCatalogue` is an immutable snapshot of one loaded model. It is
//! replaced wholesale when another model is loaded and never mutated in place.

mod bif;
mod source;

pub use bif::parse_bif;
pub use source::{decode_data_url, BifCatalogueAdapter, CatalogueAdapter, ModelSource};

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CatalogueError;

/// Identifier of a variable, unique within one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(String);

impl VariableId {
    /// Creates an identifier from a variable name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the variable name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariableId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for VariableId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Identifies one loaded catalogue instance.
///
/// Every successful load produces a fresh id, even when the same file is
/// loaded twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogueId(Uuid);

impl CatalogueId {
    /// Creates a new random catalogue id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CatalogueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CatalogueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A discrete variable and its ordered state labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVariable")]
pub struct Variable {
    id: VariableId,
    states: Vec<String>,
}

/// Wire shape of a variable before its state list is checked.
#[derive(Deserialize)]
struct RawVariable {
    id: VariableId,
    states: Vec<String>,
}

impl TryFrom<RawVariable> for Variable {
    type Error = CatalogueError;

    fn try_from(raw: RawVariable) -> Result<Self, Self::Error> {
        Self::new(raw.id, raw.states)
    }
}

impl Variable {
    /// Creates a variable.
    ///
    /// # Errors
    /// - `EmptyStates` if `states` is empty
    /// - `DuplicateState` if a label repeats
    pub fn new(
        id: impl Into<VariableId>,
        states: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, CatalogueError> {
        let id = id.into();
        let states: Vec<String> = states.into_iter().map(Into::into).collect();
        if states.is_empty() {
            return Err(CatalogueError::EmptyStates {
                variable: id.to_string(),
            });
        }
        let mut seen = HashSet::with_capacity(states.len());
        for state in &states {
            if !seen.insert(state.as_str()) {
                return Err(CatalogueError::DuplicateState {
                    variable: id.to_string(),
                    state: state.clone(),
                });
            }
        }
        Ok(Self { id, states })
    }

    /// The variable identifier.
    #[must_use]
    pub const fn id(&self) -> &VariableId {
        &self.id
    }

    /// Ordered state labels (never empty).
    #[must_use]
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// The default state offered when the variable becomes evidence.
    ///
    /// `None` only for a variable with no states, which no catalogue accepts.
    #[must_use]
    pub fn first_state(&self) -> Option<&str> {
        self.states.first().map(String::as_str)
    }

    /// Returns true if `value` is one of this variable's states.
    #[must_use]
    pub fn has_state(&self, value: &str) -> bool {
        self.states.iter().any(|s| s == value)
    }
}

/// Immutable snapshot of the variables of one loaded model.
#[derive(Debug, Clone)]
pub struct ModelCatalogue {
    id: CatalogueId,
    name: String,
    fingerprint: String,
    variables: Vec<Variable>,
    index: HashMap<VariableId, usize>,
}

impl ModelCatalogue {
    /// Builds a catalogue from an ordered list of variables.
    ///
    /// # Errors
    /// - `EmptyNetwork` if `variables` is empty
    /// - `EmptyStates` if a variable has no states
    /// - `DuplicateVariable` if an identifier repeats
    pub fn new(name: impl Into<String>, variables: Vec<Variable>) -> Result<Self, CatalogueError> {
        if variables.is_empty() {
            return Err(CatalogueError::EmptyNetwork);
        }

        let mut index = HashMap::with_capacity(variables.len());
        for (pos, var) in variables.iter().enumerate() {
            if var.states.is_empty() {
                return Err(CatalogueError::EmptyStates {
                    variable: var.id.to_string(),
                });
            }
            if index.insert(var.id.clone(), pos).is_some() {
                return Err(CatalogueError::DuplicateVariable {
                    name: var.id.to_string(),
                });
            }
        }

        Ok(Self {
            id: CatalogueId::new(),
            name: name.into(),
            fingerprint: fingerprint(&variables),
            variables,
            index,
        })
    }

    /// Id of this loaded instance.
    #[must_use]
    pub const fn id(&self) -> CatalogueId {
        self.id
    }

    /// Display name of the model (file name for uploads).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content hash over variable names and states.
    ///
    /// Two loads of the same model share a fingerprint but not an id.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Ordered variables.
    #[must_use]
    pub fn list_variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Ordered variable identifiers.
    pub fn variable_ids(&self) -> impl Iterator<Item = &VariableId> {
        self.variables.iter().map(Variable::id)
    }

    /// Looks up a variable.
    #[must_use]
    pub fn get(&self, id: &VariableId) -> Option<&Variable> {
        self.index.get(id).map(|&pos| &self.variables[pos])
    }

    /// Ordered states of a variable.
    ///
    /// # Errors
    /// `UnknownVariable` if `id` is not in this catalogue.
    pub fn states_of(&self, id: &VariableId) -> Result<&[String], CatalogueError> {
        self.get(id)
            .map(Variable::states)
            .ok_or_else(|| CatalogueError::UnknownVariable(id.clone()))
    }

    /// Returns true if `id` names a variable of this catalogue.
    #[must_use]
    pub fn contains(&self, id: &VariableId) -> bool {
        self.index.contains_key(id)
    }

    /// Catalogue position of a variable.
    #[must_use]
    pub fn position(&self, id: &VariableId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Always false for a successfully built catalogue.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

fn fingerprint(variables: &[Variable]) -> String {
    let mut hasher = blake3::Hasher::new();
    for var in variables {
        hasher.update(var.id.as_str().as_bytes());
        hasher.update(&[0x1f]);
        for state in &var.states {
            hasher.update(state.as_bytes());
            hasher.update(&[0x1e]);
        }
        hasher.update(&[0x1d]);
    }
    hasher.finalize().to_hex().to_string()
}
