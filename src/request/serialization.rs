//! Envelope serialization helpers.
//!
//! Keeps the JSON handed to out-of-process engines in one place.

use crate::error::PanelError;
use crate::request::RequestEnvelope;

/// Serialize an envelope to pretty JSON.
pub fn to_json_pretty(envelope: &RequestEnvelope) -> Result<String, PanelError> {
    serde_json::to_string_pretty(envelope).map_err(|e| PanelError::internal(format!("serialize request: {e}")))
}

/// Deserialize an envelope from JSON.
///
/// The request inside is not re-validated; engines must still reject
/// envelopes whose catalogue id they do not hold.
pub fn from_json(s: &str) -> Result<RequestEnvelope, PanelError> {
    serde_json::from_str::<RequestEnvelope>(s).map_err(|e| PanelError::internal(format!("deserialize request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{ModelCatalogue, Variable};
    use crate::request::{AnalysisRequest, DefeaterOptions};
    use crate::selection::EvidenceAssignment;

    #[test]
    fn envelope_json_keeps_tag_and_catalogue() {
        let cat = ModelCatalogue::new("m", vec![Variable::new("A", ["t", "f"]).unwrap()]).unwrap();
        let envelope = RequestEnvelope::new(
            AnalysisRequest::GetDefeaters {
                evidence: EvidenceAssignment::new(),
                target: vec!["A".into()],
                options: DefeaterOptions::default(),
            },
            &cat,
        );

        let json = to_json_pretty(&envelope).unwrap();
        assert!(json.contains("\"action\": \"get_defeaters\""));
        let decoded = from_json(&json).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.catalogue_id, cat.id());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(from_json("{\"version\": 1}").is_err());
    }
}
