//! Per-session panel state.
//!
//! A `PanelSession` owns everything one browser session can see: the loaded
//! catalogue, the selection store, remembered intent and the last rendered
//! result. Every user interaction arrives as a [`SessionEvent`] and is fully
//! propagated before `apply` returns, so a trigger always reads settled
//! state.

mod registry;

pub use registry::SessionRegistry;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalogue::{CatalogueAdapter, CatalogueId, ModelCatalogue, ModelSource, VariableId};
use crate::config::PanelConfig;
use crate::engine::runtime::EngineDispatcher;
use crate::error::{EngineError, PanelError, PanelResult, ValidationError};
use crate::notify::{NotificationStream, Notifier};
use crate::propagation::{ConstraintPropagator, PriorIntentCache, Propagation, SelectionEdit};
use crate::request::{to_json_pretty, AnalysisAction, AnalysisRequest, RequestAssembler, RequestEnvelope};
use crate::reset::{ResetCoordinator, ResetOutcome, ResetScope};
use crate::selection::{SelectionSet, SelectionStore};

/// Unique identifier for a browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Load a model, replacing the current one on success.
    LoadModel(ModelSource),
    /// Replace the Evidence membership.
    SetEvidence(SelectionSet),
    /// Choose the state of one Evidence variable.
    SetEvidenceValue {
        /// Evidence variable.
        variable: VariableId,
        /// One of its states.
        value: String,
    },
    /// Replace the Target membership.
    SetTarget(SelectionSet),
    /// Replace the R membership.
    SetR(SelectionSet),
    /// Pick the analysis to run.
    SelectAction(AnalysisAction),
    /// Run the selected analysis.
    Trigger,
}

/// Text shown in the results area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResult {
    /// Action that produced it.
    pub action: AnalysisAction,
    /// Rendered body.
    pub text: String,
}

/// What an applied event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A model was loaded and state reset.
    Loaded {
        /// New catalogue instance.
        catalogue: CatalogueId,
        /// Whether the reset cleared anything.
        reset: ResetOutcome,
    },
    /// Selections were propagated.
    Settled,
    /// The selected action changed.
    ActionSelected(AnalysisAction),
    /// An analysis ran.
    Analysed(RenderedResult),
}

/// State and behaviour of one panel session.
pub struct PanelSession {
    id: SessionId,
    adapter: Arc<dyn CatalogueAdapter>,
    dispatcher: Arc<EngineDispatcher>,
    propagator: ConstraintPropagator,
    assembler: RequestAssembler,
    catalogue: Option<Arc<ModelCatalogue>>,
    selections: SelectionStore,
    cache: PriorIntentCache,
    settled: Propagation,
    reset: ResetCoordinator,
    action: AnalysisAction,
    rendered: Option<RenderedResult>,
    notifier: Notifier,
}

impl PanelSession {
    /// Creates an empty session and its notification stream.
    pub fn new(
        config: &PanelConfig,
        adapter: Arc<dyn CatalogueAdapter>,
        dispatcher: Arc<EngineDispatcher>,
    ) -> (Self, NotificationStream) {
        let (notifier, stream) = Notifier::channel(config.notification_capacity);
        let session = Self {
            id: SessionId::new(),
            adapter,
            dispatcher,
            propagator: ConstraintPropagator::new(config.pool_order),
            assembler: RequestAssembler::new(config.defeaters),
            catalogue: None,
            selections: SelectionStore::new(),
            cache: PriorIntentCache::new(),
            settled: Propagation::default(),
            reset: ResetCoordinator::new(),
            action: AnalysisAction::default(),
            rendered: None,
            notifier,
        };
        (session, stream)
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Loaded catalogue, if any.
    #[must_use]
    pub fn catalogue(&self) -> Option<&ModelCatalogue> {
        self.catalogue.as_deref()
    }

    /// Settled selections.
    #[must_use]
    pub const fn selections(&self) -> &SelectionStore {
        &self.selections
    }

    /// Remembered intent.
    #[must_use]
    pub const fn intent(&self) -> &PriorIntentCache {
        &self.cache
    }

    /// Variables offered for Evidence, in catalogue order.
    #[must_use]
    pub fn evidence_pool(&self) -> Vec<VariableId> {
        self.catalogue()
            .map(|c| c.variable_ids().cloned().collect())
            .unwrap_or_default()
    }

    /// Variables offered for Target.
    #[must_use]
    pub fn target_pool(&self) -> &[VariableId] {
        &self.settled.target_pool
    }

    /// Variables offered for R.
    #[must_use]
    pub fn r_pool(&self) -> &[VariableId] {
        &self.settled.r_pool
    }

    /// States offered for an Evidence variable.
    #[must_use]
    pub fn evidence_options(&self, variable: &VariableId) -> Option<&[String]> {
        if !self.selections.evidence().contains(variable) {
            return None;
        }
        self.catalogue()?.states_of(variable).ok()
    }

    /// Selected action.
    #[must_use]
    pub const fn action(&self) -> AnalysisAction {
        self.action
    }

    /// Last rendered result.
    #[must_use]
    pub const fn rendered(&self) -> Option<&RenderedResult> {
        self.rendered.as_ref()
    }

    /// Applies one interaction and settles propagation.
    ///
    /// Every error is also published on the notification stream.
    pub fn apply(&mut self, event: SessionEvent) -> PanelResult<SessionUpdate> {
        match event {
            SessionEvent::LoadModel(source) => self.load_model(&source),
            SessionEvent::SetEvidence(set) => Ok(self.settle(SelectionEdit::Evidence(set))),
            SessionEvent::SetTarget(set) => Ok(self.settle(SelectionEdit::Target(set))),
            SessionEvent::SetR(set) => Ok(self.settle(SelectionEdit::R(set))),
            SessionEvent::SetEvidenceValue { variable, value } => {
                self.set_evidence_value(&variable, value)?;
                Ok(SessionUpdate::Settled)
            }
            SessionEvent::SelectAction(action) => {
                self.action = action;
                Ok(SessionUpdate::ActionSelected(action))
            }
            SessionEvent::Trigger => self.trigger().map(SessionUpdate::Analysed),
        }
    }

    fn load_model(&mut self, source: &ModelSource) -> PanelResult<SessionUpdate> {
        let catalogue = match self.adapter.load_model(source) {
            Ok(catalogue) => Arc::new(catalogue),
            Err(err) => {
                tracing::warn!(session = %self.id, error = %err, "model load failed; keeping current model");
                self.notifier.error("Error loading network", err.to_string());
                return Err(err.into());
            }
        };

        let id = catalogue.id();
        tracing::info!(
            session = %self.id,
            catalogue = %id,
            name = catalogue.name(),
            variables = catalogue.len(),
            fingerprint = catalogue.fingerprint(),
            "model loaded"
        );
        self.catalogue = Some(Arc::clone(&catalogue));
        let outcome = self.reset.dataset_changed(
            id,
            ResetScope {
                selections: &mut self.selections,
                cache: &mut self.cache,
                rendered: &mut self.rendered,
            },
        );
        if outcome == ResetOutcome::Applied {
            self.notifier.info(
                "Network loaded",
                format!("{} ({} variables); selections cleared", catalogue.name(), catalogue.len()),
            );
        }
        self.settle(SelectionEdit::Refresh);
        Ok(SessionUpdate::Loaded {
            catalogue: id,
            reset: outcome,
        })
    }

    fn settle(&mut self, edit: SelectionEdit) -> SessionUpdate {
        let propagation = self
            .propagator
            .propagate(self.catalogue.as_deref(), &self.selections, edit, &mut self.cache);
        if let Some(catalogue) = self.catalogue.as_deref() {
            self.selections.sync_evidence(catalogue, &propagation.evidence);
        } else {
            self.selections.clear();
        }
        self.selections.replace_target(propagation.target.clone());
        self.selections.replace_r(propagation.r.clone());
        self.settled = propagation;
        SessionUpdate::Settled
    }

    fn set_evidence_value(&mut self, variable: &VariableId, value: String) -> Result<(), ValidationError> {
        let result = match self.catalogue.as_deref() {
            Some(catalogue) => self.selections.set_evidence_value(catalogue, variable, value),
            None => Err(ValidationError::NoModelLoaded),
        };
        if let Err(err) = &result {
            self.notifier.warning("Invalid evidence value", err.to_string());
        }
        result
    }

    fn trigger(&mut self) -> PanelResult<RenderedResult> {
        let request = match self
            .assembler
            .assemble(self.action, self.catalogue.as_deref(), &self.selections)
        {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(session = %self.id, action = %self.action, error = %err, "request rejected");
                self.notifier.warning("Invalid selection", err.to_string());
                self.rendered = None;
                return Err(err.into());
            }
        };

        let catalogue = self.catalogue.as_deref().ok_or(ValidationError::NoModelLoaded)?;
        let envelope = RequestEnvelope::new(request.clone(), catalogue);
        tracing::info!(
            session = %self.id,
            request_id = %envelope.request_id,
            action = %request.action(),
            fingerprint = %envelope.catalogue_fingerprint,
            "dispatching analysis"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Ok(json) = to_json_pretty(&envelope) {
                tracing::trace!(session = %self.id, envelope = %json, "outgoing envelope");
            }
        }

        match self.run_engine(&request, envelope) {
            Ok(rendered) => {
                self.notifier.info(rendered.action.label(), "Analysis complete");
                self.rendered = Some(rendered.clone());
                Ok(rendered)
            }
            Err(err) => {
                tracing::warn!(session = %self.id, action = %request.action(), error = %err, "analysis failed");
                self.notify_failure(request.action(), &err);
                self.rendered = None;
                Err(err)
            }
        }
    }

    fn run_engine(&self, request: &AnalysisRequest, envelope: RequestEnvelope) -> PanelResult<RenderedResult> {
        let result = self.dispatcher.run(envelope)?;
        if result.action() != request.action() {
            return Err(EngineError::failure(format!(
                "engine returned a {} result for a {} request",
                result.action(),
                request.action()
            ))
            .into());
        }
        Ok(RenderedResult {
            action: request.action(),
            text: result.summary(request),
        })
    }

    fn notify_failure(&self, action: AnalysisAction, err: &PanelError) {
        match err {
            PanelError::Engine(EngineError::ImpossibleEvidence) => {
                self.notifier.error("Impossible Evidence", "The evidence has zero probability under the model");
            }
            PanelError::Engine(EngineError::ComputationFailure { reason }) => {
                self.notifier.error(format!("Error in {}", action.label()), reason.clone());
            }
            other => {
                self.notifier.error(format!("Error in {}", action.label()), other.to_string());
            }
        }
    }
}

impl fmt::Debug for PanelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelSession")
            .field("id", &self.id)
            .field("catalogue", &self.catalogue.as_ref().map(|c| c.id()))
            .field("selections", &self.selections)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::BifCatalogueAdapter;
    use crate::engine::{AnalysisResult, InferenceEngine, PosteriorRow};
    use crate::error::SelectionField;
    use crate::notify::Severity;

    const NET: &str = "variable A {\n  type discrete [ 2 ] { true, false };\n}\nvariable B {\n  type discrete [ 2 ] { yes, no };\n}\nvariable C {\n  type discrete [ 3 ] { low, mid, high };\n}\n";

    struct EchoEngine;

    impl InferenceEngine for EchoEngine {
        fn run(&self, request: &AnalysisRequest) -> Result<AnalysisResult, EngineError> {
            match request {
                AnalysisRequest::ComputePosterior { evidence, .. } if evidence.get(&"A".into()) == Some("false") => {
                    Err(EngineError::ImpossibleEvidence)
                }
                AnalysisRequest::ComputePosterior { .. } => Ok(AnalysisResult::Posterior {
                    rows: vec![PosteriorRow {
                        states: vec!["yes".to_string()],
                        probability: 1.0,
                    }],
                }),
                // Wrong shape on purpose.
                _ => Ok(AnalysisResult::Posterior { rows: Vec::new() }),
            }
        }
    }

    fn session() -> (PanelSession, NotificationStream) {
        let config = PanelConfig::default();
        let dispatcher = EngineDispatcher::start(&config.dispatcher, Arc::new(EchoEngine)).unwrap();
        PanelSession::new(&config, Arc::new(BifCatalogueAdapter::default()), Arc::new(dispatcher))
    }

    fn load(session: &mut PanelSession) {
        session
            .apply(SessionEvent::LoadModel(ModelSource::Inline {
                name: "net.bif".to_string(),
                content: NET.to_string(),
            }))
            .unwrap();
    }

    fn set(ids: &[&str]) -> SelectionSet {
        ids.iter().map(|s| VariableId::from(*s)).collect()
    }

    #[test]
    fn load_populates_pools_and_notifies() {
        let (mut s, stream) = session();
        load(&mut s);
        assert_eq!(s.evidence_pool().len(), 3);
        assert_eq!(s.target_pool().len(), 3);
        let notes = stream.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Info);
    }

    #[test]
    fn failed_load_keeps_previous_model() {
        let (mut s, stream) = session();
        load(&mut s);
        s.apply(SessionEvent::SetTarget(set(&["B"]))).unwrap();
        let before = s.catalogue().map(ModelCatalogue::id);

        let err = s
            .apply(SessionEvent::LoadModel(ModelSource::Inline {
                name: "bad.bif".to_string(),
                content: "variable X {\n  type discrete [ 2 ] { a };\n}\n".to_string(),
            }))
            .unwrap_err();
        assert!(err.is_catalogue());
        assert_eq!(s.catalogue().map(ModelCatalogue::id), before);
        assert_eq!(s.selections().target(), &set(&["B"]));
        assert_eq!(stream.drain().last().map(|n| n.severity), Some(Severity::Error));
    }

    #[test]
    fn evidence_options_follow_evidence_membership() {
        let (mut s, _stream) = session();
        load(&mut s);
        assert!(s.evidence_options(&"C".into()).is_none());
        s.apply(SessionEvent::SetEvidence(set(&["C"]))).unwrap();
        assert_eq!(s.evidence_options(&"C".into()).unwrap(), ["low", "mid", "high"]);
        assert_eq!(s.selections().evidence().get(&"C".into()), Some("low"));
    }

    #[test]
    fn invalid_evidence_value_is_rejected_and_notified() {
        let (mut s, stream) = session();
        load(&mut s);
        stream.drain();
        s.apply(SessionEvent::SetEvidence(set(&["A"]))).unwrap();
        let err = s
            .apply(SessionEvent::SetEvidenceValue {
                variable: "A".into(),
                value: "x".to_string(),
            })
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(s.selections().evidence().get(&"A".into()), Some("true"));
        assert_eq!(stream.drain().len(), 1);
    }

    #[test]
    fn trigger_renders_posterior() {
        let (mut s, _stream) = session();
        load(&mut s);
        s.apply(SessionEvent::SetEvidence(set(&["A"]))).unwrap();
        s.apply(SessionEvent::SetTarget(set(&["B"]))).unwrap();
        let update = s.apply(SessionEvent::Trigger).unwrap();
        let SessionUpdate::Analysed(rendered) = update else {
            panic!("expected SessionUpdate::Analysed");
        };
        assert_eq!(rendered.text, "Compute Posterior\n(yes) -> 1.000000");
        assert_eq!(s.rendered(), Some(&rendered));
    }

    #[test]
    fn trigger_without_model_is_rejected() {
        let (mut s, stream) = session();
        let err = s.apply(SessionEvent::Trigger).unwrap_err();
        assert!(matches!(err, PanelError::Validation(ValidationError::NoModelLoaded)));
        assert_eq!(stream.drain()[0].severity, Severity::Warning);
    }

    #[test]
    fn map_independence_needs_r() {
        let (mut s, _stream) = session();
        load(&mut s);
        s.apply(SessionEvent::SelectAction(AnalysisAction::MapIndependence)).unwrap();
        s.apply(SessionEvent::SetTarget(set(&["B"]))).unwrap();
        let err = s.apply(SessionEvent::Trigger).unwrap_err();
        assert!(matches!(
            err,
            PanelError::Validation(ValidationError::MissingSelection {
                field: SelectionField::R
            })
        ));
    }

    #[test]
    fn impossible_evidence_is_reported() {
        let (mut s, stream) = session();
        load(&mut s);
        s.apply(SessionEvent::SetEvidence(set(&["A"]))).unwrap();
        s.apply(SessionEvent::SetEvidenceValue {
            variable: "A".into(),
            value: "false".to_string(),
        })
        .unwrap();
        s.apply(SessionEvent::SetTarget(set(&["B"]))).unwrap();
        stream.drain();

        let err = s.apply(SessionEvent::Trigger).unwrap_err();
        assert!(matches!(err, PanelError::Engine(EngineError::ImpossibleEvidence)));
        let notes = stream.drain();
        assert_eq!(notes[0].title, "Impossible Evidence");
        assert!(s.rendered().is_none());
    }

    #[test]
    fn rejected_trigger_clears_previous_result() {
        let (mut s, _stream) = session();
        load(&mut s);
        s.apply(SessionEvent::SetTarget(set(&["B"]))).unwrap();
        s.apply(SessionEvent::Trigger).unwrap();
        assert!(s.rendered().is_some());

        s.apply(SessionEvent::SetTarget(SelectionSet::new())).unwrap();
        let err = s.apply(SessionEvent::Trigger).unwrap_err();
        assert!(err.is_validation());
        assert!(s.rendered().is_none());
    }

    #[test]
    fn mismatched_result_shape_is_a_failure() {
        let (mut s, _stream) = session();
        load(&mut s);
        s.apply(SessionEvent::SelectAction(AnalysisAction::GetDefeaters)).unwrap();
        s.apply(SessionEvent::SetTarget(set(&["B"]))).unwrap();
        let err = s.apply(SessionEvent::Trigger).unwrap_err();
        assert!(matches!(err, PanelError::Engine(EngineError::ComputationFailure { .. })));
    }

    #[test]
    fn reload_clears_selections_and_result() {
        let (mut s, _stream) = session();
        load(&mut s);
        s.apply(SessionEvent::SetEvidence(set(&["A"]))).unwrap();
        s.apply(SessionEvent::SetTarget(set(&["B"]))).unwrap();
        s.apply(SessionEvent::Trigger).unwrap();

        load(&mut s);
        assert!(s.selections().is_empty());
        assert!(s.intent().is_empty());
        assert!(s.rendered().is_none());
    }
}
