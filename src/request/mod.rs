//! Analysis requests handed to the inference engine.
//!
//! A request is a value built fresh for each dispatch by the
//! [`RequestAssembler`]; nothing mutates it afterwards.

mod assembler;
mod serialization;

pub use assembler::RequestAssembler;
pub use serialization::{from_json, to_json_pretty};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalogue::{CatalogueId, ModelCatalogue, VariableId};
use crate::error::{PanelError, SelectionField};
use crate::selection::EvidenceAssignment;

/// The analyses the panel can request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisAction {
    /// Posterior distribution of the Target variables.
    #[default]
    #[serde(rename = "posterior")]
    ComputePosterior,
    /// Whether interventions on R can alter the MAP assignment of Target.
    MapIndependence,
    /// Relevant and irrelevant defeater sets for the Target MAP assignment.
    #[serde(rename = "defeaters")]
    GetDefeaters,
}

impl AnalysisAction {
    /// All actions, in menu order.
    pub const ALL: [Self; 3] = [Self::ComputePosterior, Self::MapIndependence, Self::GetDefeaters];

    /// Selection sets that must be non-empty, in check order.
    #[must_use]
    pub const fn required_fields(self) -> &'static [SelectionField] {
        match self {
            Self::ComputePosterior | Self::GetDefeaters => &[SelectionField::Target],
            Self::MapIndependence => &[SelectionField::Target, SelectionField::R],
        }
    }

    /// Returns true if the action reads the R selection.
    #[must_use]
    pub const fn uses_r(self) -> bool {
        matches!(self, Self::MapIndependence)
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ComputePosterior => "Compute Posterior",
            Self::MapIndependence => "MAP Independence",
            Self::GetDefeaters => "Get Defeaters",
        }
    }

    /// Stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ComputePosterior => "posterior",
            Self::MapIndependence => "map_independence",
            Self::GetDefeaters => "defeaters",
        }
    }
}

impl fmt::Display for AnalysisAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AnalysisAction {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| PanelError::internal(format!("unknown action '{s}'")))
    }
}

/// Search options for defeater requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefeaterOptions {
    /// Largest defeater set size to explore; `None` is unbounded.
    pub max_depth: Option<usize>,
    /// Whether single-variable sets are evaluated.
    pub evaluate_singletons: bool,
}

impl Default for DefeaterOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            evaluate_singletons: true,
        }
    }
}

/// A validated analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AnalysisRequest {
    /// Posterior of `target` given `evidence`.
    ComputePosterior {
        /// Observed states.
        evidence: EvidenceAssignment,
        /// Variables whose joint posterior is computed.
        target: Vec<VariableId>,
    },
    /// MAP independence of `target` with respect to `r`.
    MapIndependence {
        /// Observed states.
        evidence: EvidenceAssignment,
        /// MAP variables.
        target: Vec<VariableId>,
        /// Intervention set.
        r: Vec<VariableId>,
    },
    /// Defeater search for the MAP assignment of `target`.
    GetDefeaters {
        /// Observed states.
        evidence: EvidenceAssignment,
        /// MAP variables.
        target: Vec<VariableId>,
        /// Search options.
        options: DefeaterOptions,
    },
}

impl AnalysisRequest {
    /// The action this request performs.
    #[must_use]
    pub const fn action(&self) -> AnalysisAction {
        match self {
            Self::ComputePosterior { .. } => AnalysisAction::ComputePosterior,
            Self::MapIndependence { .. } => AnalysisAction::MapIndependence,
            Self::GetDefeaters { .. } => AnalysisAction::GetDefeaters,
        }
    }

    /// Evidence of the request.
    #[must_use]
    pub const fn evidence(&self) -> &EvidenceAssignment {
        match self {
            Self::ComputePosterior { evidence, .. }
            | Self::MapIndependence { evidence, .. }
            | Self::GetDefeaters { evidence, .. } => evidence,
        }
    }

    /// Target variables of the request.
    #[must_use]
    pub fn target(&self) -> &[VariableId] {
        match self {
            Self::ComputePosterior { target, .. }
            | Self::MapIndependence { target, .. }
            | Self::GetDefeaters { target, .. } => target.as_slice(),
        }
    }

    /// R variables, for MAP independence only.
    #[must_use]
    pub fn r(&self) -> Option<&[VariableId]> {
        match self {
            Self::MapIndependence { r, .. } => Some(r.as_slice()),
            _ => None,
        }
    }
}

/// A request bound to the catalogue it was validated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Envelope format version.
    pub version: String,
    /// Unique id for log correlation.
    pub request_id: Uuid,
    /// Loaded catalogue instance.
    pub catalogue_id: CatalogueId,
    /// Content fingerprint of that catalogue.
    pub catalogue_fingerprint: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// The request itself.
    pub request: AnalysisRequest,
}

impl RequestEnvelope {
    /// Current envelope version.
    pub const CURRENT_VERSION: &'static str = "1.0";

    /// Wraps `request` for the given catalogue.
    #[must_use]
    pub fn new(request: AnalysisRequest, catalogue: &ModelCatalogue) -> Self {
        Self {
            version: Self::CURRENT_VERSION.to_string(),
            request_id: Uuid::new_v4(),
            catalogue_id: catalogue.id(),
            catalogue_fingerprint: catalogue.fingerprint().to_string(),
            created_at: Utc::now(),
            request,
        }
    }
}
