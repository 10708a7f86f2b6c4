//! Session registry.
//!
//! Sessions are created when a browser session starts and dropped when it
//! ends. Each session sits behind its own lock; sessions share only the
//! immutable configuration, the model adapter and the engine dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::catalogue::{BifCatalogueAdapter, CatalogueAdapter};
use crate::config::PanelConfig;
use crate::engine::runtime::EngineDispatcher;
use crate::error::{PanelError, PanelResult};
use crate::notify::NotificationStream;
use crate::session::{PanelSession, SessionEvent, SessionId, SessionUpdate};

fn lock_err(context: &'static str) -> PanelError {
    PanelError::internal(format!("poisoned lock: {context}"))
}

/// Creates, looks up and discards sessions.
pub struct SessionRegistry {
    config: PanelConfig,
    adapter: Arc<dyn CatalogueAdapter>,
    dispatcher: Arc<EngineDispatcher>,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<PanelSession>>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(config: PanelConfig, adapter: Arc<dyn CatalogueAdapter>, dispatcher: Arc<EngineDispatcher>) -> Self {
        Self {
            config,
            adapter,
            dispatcher,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty registry that loads BIF models, with the default
    /// network taken from `config.default_model`.
    pub fn with_bif_adapter(config: PanelConfig, dispatcher: Arc<EngineDispatcher>) -> Self {
        let adapter = Arc::new(BifCatalogueAdapter::from_config(&config));
        Self::new(config, adapter, dispatcher)
    }

    /// Starts a session and returns its id and notification stream.
    pub fn start(&self) -> PanelResult<(SessionId, NotificationStream)> {
        let (session, stream) = PanelSession::new(&self.config, Arc::clone(&self.adapter), Arc::clone(&self.dispatcher));
        let id = session.id();
        self.sessions
            .write()
            .map_err(|_| lock_err("sessions"))?
            .insert(id, Arc::new(Mutex::new(session)));
        tracing::info!(session = %id, "session started");
        Ok((id, stream))
    }

    /// Ends a session. Returns false if it was not registered.
    pub fn end(&self, id: SessionId) -> PanelResult<bool> {
        let removed = self
            .sessions
            .write()
            .map_err(|_| lock_err("sessions"))?
            .remove(&id)
            .is_some();
        if removed {
            tracing::info!(session = %id, "session ended");
        }
        Ok(removed)
    }

    /// Number of live sessions.
    pub fn len(&self) -> PanelResult<usize> {
        Ok(self.sessions.read().map_err(|_| lock_err("sessions"))?.len())
    }

    /// Returns true if no session is live.
    pub fn is_empty(&self) -> PanelResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Runs `f` against one session.
    ///
    /// # Errors
    /// `UnknownSession` if `id` is not registered.
    pub fn with_session<R>(&self, id: SessionId, f: impl FnOnce(&mut PanelSession) -> R) -> PanelResult<R> {
        let session = self
            .sessions
            .read()
            .map_err(|_| lock_err("sessions"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| PanelError::UnknownSession { id: id.to_string() })?;
        let mut guard = session.lock().map_err(|_| lock_err("session"))?;
        Ok(f(&mut *guard))
    }

    /// Applies an event to one session.
    pub fn apply(&self, id: SessionId, event: SessionEvent) -> PanelResult<SessionUpdate> {
        self.with_session(id, |s| s.apply(event))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{ModelSource, VariableId};
    use crate::engine::{AnalysisResult, InferenceEngine};
    use crate::error::{CatalogueError, EngineError};
    use crate::request::AnalysisRequest;
    use crate::selection::SelectionSet;

    struct NullEngine;

    impl InferenceEngine for NullEngine {
        fn run(&self, _request: &AnalysisRequest) -> Result<AnalysisResult, EngineError> {
            Err(EngineError::failure("not available"))
        }
    }

    fn registry() -> SessionRegistry {
        let config = PanelConfig::default();
        let dispatcher = EngineDispatcher::start(&config.dispatcher, Arc::new(NullEngine)).unwrap();
        SessionRegistry::with_bif_adapter(config, Arc::new(dispatcher))
    }

    fn load_event() -> SessionEvent {
        SessionEvent::LoadModel(ModelSource::Inline {
            name: "net.bif".to_string(),
            content: "variable A {\n  type discrete [ 2 ] { t, f };\n}\nvariable B {\n  type discrete [ 2 ] { t, f };\n}\n"
                .to_string(),
        })
    }

    #[test]
    fn sessions_are_isolated() {
        let reg = registry();
        let (a, _sa) = reg.start().unwrap();
        let (b, _sb) = reg.start().unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.len().unwrap(), 2);

        reg.apply(a, load_event()).unwrap();
        reg.apply(b, load_event()).unwrap();
        let target: SelectionSet = [VariableId::from("B")].into_iter().collect();
        reg.apply(a, SessionEvent::SetTarget(target.clone())).unwrap();

        let a_target = reg.with_session(a, |s| s.selections().target().clone()).unwrap();
        let b_target = reg.with_session(b, |s| s.selections().target().clone()).unwrap();
        assert_eq!(a_target, target);
        assert!(b_target.is_empty());
    }

    #[test]
    fn default_network_comes_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.bif");
        std::fs::write(&path, "variable Rain {\n  type discrete [ 2 ] { yes, no };\n}\n").unwrap();

        let json = serde_json::json!({ "default_model": path }).to_string();
        let config = PanelConfig::from_json(&json).unwrap();
        let dispatcher = EngineDispatcher::start(&config.dispatcher, Arc::new(NullEngine)).unwrap();
        let reg = SessionRegistry::with_bif_adapter(config, Arc::new(dispatcher));

        let (id, _stream) = reg.start().unwrap();
        let update = reg.apply(id, SessionEvent::LoadModel(ModelSource::Default)).unwrap();
        assert!(matches!(update, SessionUpdate::Loaded { .. }));
        let names = reg
            .with_session(id, |s| s.catalogue().map(|c| c.name().to_string()))
            .unwrap();
        assert_eq!(names.as_deref(), Some("default.bif"));
    }

    #[test]
    fn default_network_missing_from_config_fails_to_load() {
        let config = PanelConfig::default();
        let dispatcher = EngineDispatcher::start(&config.dispatcher, Arc::new(NullEngine)).unwrap();
        let reg = SessionRegistry::with_bif_adapter(config, Arc::new(dispatcher));

        let (id, _stream) = reg.start().unwrap();
        let err = reg.apply(id, SessionEvent::LoadModel(ModelSource::Default)).unwrap_err();
        assert!(matches!(err, PanelError::Catalogue(CatalogueError::NoDefaultModel)));
    }

    #[test]
    fn ended_session_is_unknown() {
        let reg = registry();
        let (id, _stream) = reg.start().unwrap();
        assert!(reg.end(id).unwrap());
        assert!(!reg.end(id).unwrap());
        assert!(reg.is_empty().unwrap());

        let err = reg.apply(id, SessionEvent::Trigger).unwrap_err();
        assert!(matches!(err, PanelError::UnknownSession { .. }));
    }
}
