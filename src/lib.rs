//! # probpanel - selection engine for a probabilistic explanation panel
//!
//! A user loads a discrete Bayesian network, picks three mutually exclusive
//! groups of variables (Evidence, Target and an intervention set R) and asks
//! an external inference engine for a posterior, a MAP independence check or
//! a defeater search. This crate keeps those groups consistent while the
//! model and the selections change, and turns them into one validated
//! request per trigger.
//!
//! ## Core Concepts
//!
//! - **Catalogue**: the variables and state labels of the loaded model
//! - **Selection store**: Evidence (with chosen states), Target and R
//! - **Propagation**: recomputes what Target and R may offer after each edit
//! - **Reset**: clears derived state once per model load
//! - **Assembler**: validates the selections into an `AnalysisRequest`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use probpanel::{PanelSession, SessionEvent, ModelSource, AnalysisAction};
//!
//! let (mut session, notifications) = PanelSession::new(&config, adapter, dispatcher);
//! session.apply(SessionEvent::LoadModel(ModelSource::Default))?;
//! session.apply(SessionEvent::SetEvidence(["A".into()].into()))?;
//! session.apply(SessionEvent::SetTarget(["B".into()].into()))?;
//! session.apply(SessionEvent::SelectAction(AnalysisAction::ComputePosterior))?;
//! let update = session.apply(SessionEvent::Trigger)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalogue;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod propagation;
pub mod request;
pub mod reset;
pub mod selection;
pub mod session;

// Re-export primary types at crate root for convenience
pub use catalogue::{
    BifCatalogueAdapter, CatalogueAdapter, CatalogueId, ModelCatalogue, ModelSource, Variable, VariableId,
};
pub use config::{DispatcherConfig, PanelConfig, PoolOrder};
pub use engine::runtime::{EngineDispatcher, ExecutionHandle};
pub use engine::{AnalysisResult, InferenceEngine, PosteriorRow};
pub use error::{
    CatalogueError, DispatchError, EngineError, PanelError, PanelResult, SelectionField, ValidationError,
};
pub use notify::{Notification, NotificationStream, Notifier, Severity};
pub use propagation::{ConstraintPropagator, PriorIntentCache, Propagation, SelectionEdit};
pub use request::{AnalysisAction, AnalysisRequest, DefeaterOptions, RequestAssembler, RequestEnvelope};
pub use reset::{ResetCoordinator, ResetOutcome, ResetScope};
pub use selection::{EvidenceAssignment, SelectionSet, SelectionStore};
pub use session::{PanelSession, RenderedResult, SessionEvent, SessionId, SessionRegistry, SessionUpdate};
