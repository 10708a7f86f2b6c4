//! Request assembly and validation.

use crate::catalogue::{ModelCatalogue, VariableId};
use crate::error::{SelectionField, ValidationError};
use crate::request::{AnalysisAction, AnalysisRequest, DefeaterOptions};
use crate::selection::{SelectionSet, SelectionStore};

/// Builds one [`AnalysisRequest`] from the current selections.
///
/// Checks run in a fixed order and the first failure is returned:
/// 1. a model is loaded
/// 2. the action's required sets are non-empty
/// 3. Evidence and Target are disjoint
/// 4. for MAP independence, R is disjoint from Evidence and Target
/// 5. every Target/R identifier belongs to the loaded model
/// 6. every evidence state belongs to its variable in the loaded model
///
/// The store is re-checked against the catalogue even though propagation
/// already confines it; the catalogue may have been replaced since.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestAssembler {
    defeaters: DefeaterOptions,
}

impl RequestAssembler {
    /// Creates an assembler attaching `defeaters` to defeater requests.
    #[must_use]
    pub const fn new(defeaters: DefeaterOptions) -> Self {
        Self { defeaters }
    }

    /// Validates the selections and builds the request for `action`.
    pub fn assemble(
        &self,
        action: AnalysisAction,
        catalogue: Option<&ModelCatalogue>,
        selections: &SelectionStore,
    ) -> Result<AnalysisRequest, ValidationError> {
        let catalogue = catalogue.ok_or(ValidationError::NoModelLoaded)?;

        for &field in action.required_fields() {
            if selections.set(field).is_empty() {
                return Err(ValidationError::MissingSelection { field });
            }
        }

        let evidence_vars = selections.evidence().variables();
        let target = selections.target();
        if !evidence_vars.is_disjoint(target) {
            return Err(ValidationError::OverlapError {
                first: SelectionField::Evidence,
                second: SelectionField::Target,
            });
        }

        if action.uses_r() {
            let r = selections.r();
            if !evidence_vars.is_disjoint(r) {
                return Err(ValidationError::OverlapError {
                    first: SelectionField::Evidence,
                    second: SelectionField::R,
                });
            }
            if !target.is_disjoint(r) {
                return Err(ValidationError::OverlapError {
                    first: SelectionField::Target,
                    second: SelectionField::R,
                });
            }
        }

        let target = ordered_members(catalogue, SelectionField::Target, target)?;
        let r = if action.uses_r() {
            ordered_members(catalogue, SelectionField::R, selections.r())?
        } else {
            Vec::new()
        };

        for (variable, value) in selections.evidence().iter() {
            let known = catalogue.get(variable).is_some_and(|v| v.has_state(value));
            if !known {
                return Err(ValidationError::InvalidEvidenceValue {
                    variable: variable.clone(),
                    value: value.to_string(),
                });
            }
        }

        let evidence = selections.evidence().clone();
        let request = match action {
            AnalysisAction::ComputePosterior => AnalysisRequest::ComputePosterior { evidence, target },
            AnalysisAction::MapIndependence => AnalysisRequest::MapIndependence { evidence, target, r },
            AnalysisAction::GetDefeaters => AnalysisRequest::GetDefeaters {
                evidence,
                target,
                options: self.defeaters,
            },
        };
        Ok(request)
    }
}

/// Members of `set` in catalogue order, failing on the first unknown id.
fn ordered_members(
    catalogue: &ModelCatalogue,
    field: SelectionField,
    set: &SelectionSet,
) -> Result<Vec<VariableId>, ValidationError> {
    let mut positioned = Vec::with_capacity(set.len());
    for id in set {
        let Some(pos) = catalogue.position(id) else {
            return Err(ValidationError::UnknownVariable {
                field,
                variable: id.clone(),
            });
        };
        positioned.push((pos, id.clone()));
    }
    positioned.sort_by_key(|(pos, _)| *pos);
    Ok(positioned.into_iter().map(|(_, id)| id).collect())
}
