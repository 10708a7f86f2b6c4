//! Inference engine boundary.
//!
//! The numerical routines (posterior, MAP, independence, defeater search)
//! live behind [`InferenceEngine`]. This module defines the result shapes
//! and how they are rendered for the panel.

/// Bounded worker pool running engine calls off the interaction path.
pub mod runtime;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::catalogue::VariableId;
use crate::error::EngineError;
use crate::request::{AnalysisAction, AnalysisRequest};
use crate::selection::SelectionSet;

/// External inference engine.
pub trait InferenceEngine: Send + Sync {
    /// Runs one validated request.
    fn run(&self, request: &AnalysisRequest) -> Result<AnalysisResult, EngineError>;
}

/// One row of a joint posterior table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorRow {
    /// One state per target variable, in request order.
    pub states: Vec<String>,
    /// Posterior probability of that joint state.
    pub probability: f64,
}

/// Action-shaped engine output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResult {
    /// Joint posterior over the target variables.
    Posterior {
        /// Rows over the target domain.
        rows: Vec<PosteriorRow>,
    },
    /// MAP assignment and its independence from R.
    MapIndependence {
        /// MAP state per target variable.
        assignment: BTreeMap<VariableId, String>,
        /// Probability of the MAP assignment.
        probability: f64,
        /// True when no intervention on R alters the assignment.
        independent: bool,
    },
    /// Defeater sets of the MAP assignment.
    Defeaters {
        /// Sets whose intervention can alter the MAP assignment.
        relevant: Vec<SelectionSet>,
        /// Sets whose intervention cannot.
        irrelevant: Vec<SelectionSet>,
    },
}

impl AnalysisResult {
    /// The action that produces this shape.
    #[must_use]
    pub const fn action(&self) -> AnalysisAction {
        match self {
            Self::Posterior { .. } => AnalysisAction::ComputePosterior,
            Self::MapIndependence { .. } => AnalysisAction::MapIndependence,
            Self::Defeaters { .. } => AnalysisAction::GetDefeaters,
        }
    }

    /// Renders the result as panel text.
    #[must_use]
    pub fn summary(&self, request: &AnalysisRequest) -> String {
        match self {
            Self::Posterior { rows } => {
                let mut out = String::from("Compute Posterior");
                for row in rows {
                    let _ = write!(out, "\n({}) -> {:.6}", row.states.join(", "), row.probability);
                }
                out
            }
            Self::MapIndependence {
                assignment,
                independent,
                ..
            } => {
                let assignment = assignment
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let r = request.r().map(join_ids).unwrap_or_default();
                if *independent {
                    format!(
                        "The MAP assignment {{{assignment}}} is NOT altered by interventions on [{r}] (INDEPENDENT)."
                    )
                } else {
                    format!("The MAP assignment {{{assignment}}} IS altered by [{r}] (DEPENDENT).")
                }
            }
            Self::Defeaters { relevant, irrelevant } => format!(
                "Get Defeaters Results\nRelevant sets (these can alter the MAP assignment):\n{}\nIrrelevant sets (cannot alter MAP):\n{}",
                render_sets(relevant),
                render_sets(irrelevant)
            ),
        }
    }
}

fn join_ids(ids: &[VariableId]) -> String {
    ids.iter().map(VariableId::as_str).collect::<Vec<_>>().join(", ")
}

fn render_sets(sets: &[SelectionSet]) -> String {
    if sets.is_empty() {
        return "None".to_string();
    }
    sets.iter()
        .map(|s| format!("{{{}}}", s.iter().map(VariableId::as_str).collect::<Vec<_>>().join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::DefeaterOptions;
    use crate::selection::EvidenceAssignment;

    fn map_request() -> AnalysisRequest {
        AnalysisRequest::MapIndependence {
            evidence: EvidenceAssignment::new(),
            target: vec!["B".into()],
            r: vec!["C".into(), "D".into()],
        }
    }

    #[test]
    fn posterior_rows_use_six_decimals() {
        let request = AnalysisRequest::ComputePosterior {
            evidence: EvidenceAssignment::new(),
            target: vec!["B".into()],
        };
        let result = AnalysisResult::Posterior {
            rows: vec![
                PosteriorRow {
                    states: vec!["yes".to_string()],
                    probability: 0.25,
                },
                PosteriorRow {
                    states: vec!["no".to_string()],
                    probability: 0.75,
                },
            ],
        };
        assert_eq!(
            result.summary(&request),
            "Compute Posterior\n(yes) -> 0.250000\n(no) -> 0.750000"
        );
    }

    #[test]
    fn map_independence_sentences() {
        let mut assignment = BTreeMap::new();
        assignment.insert(VariableId::from("B"), "on".to_string());
        let independent = AnalysisResult::MapIndependence {
            assignment: assignment.clone(),
            probability: 0.6,
            independent: true,
        };
        assert_eq!(
            independent.summary(&map_request()),
            "The MAP assignment {B=on} is NOT altered by interventions on [C, D] (INDEPENDENT)."
        );

        let dependent = AnalysisResult::MapIndependence {
            assignment,
            probability: 0.6,
            independent: false,
        };
        assert!(dependent.summary(&map_request()).ends_with("(DEPENDENT)."));
    }

    #[test]
    fn empty_defeater_lists_render_none() {
        let request = AnalysisRequest::GetDefeaters {
            evidence: EvidenceAssignment::new(),
            target: vec!["B".into()],
            options: DefeaterOptions::default(),
        };
        let relevant: SelectionSet = ["A", "C"].into_iter().map(VariableId::from).collect();
        let result = AnalysisResult::Defeaters {
            relevant: vec![relevant],
            irrelevant: Vec::new(),
        };
        let text = result.summary(&request);
        assert!(text.contains("{A, C}"));
        assert!(text.ends_with("Irrelevant sets (cannot alter MAP):\nNone"));
        assert_eq!(result.action(), AnalysisAction::GetDefeaters);
    }
}
