//! Model sources and the catalogue adapter seam.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::catalogue::{parse_bif, ModelCatalogue};
use crate::config::PanelConfig;
use crate::error::CatalogueError;

/// Where a model comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSource {
    /// The configured default network.
    Default,
    /// A model file on disk.
    Path {
        /// File location.
        path: PathBuf,
    },
    /// Model text already in memory.
    Inline {
        /// Display name.
        name: String,
        /// BIF document.
        content: String,
    },
    /// A browser upload, as a `data:<mime>;base64,<payload>` URL.
    Upload {
        /// Original file name.
        filename: String,
        /// Data URL produced by the upload widget.
        contents: String,
    },
}

/// Turns a model source into a catalogue.
pub trait CatalogueAdapter: Send + Sync {
    /// Loads and parses a model.
    fn load_model(&self, source: &ModelSource) -> Result<ModelCatalogue, CatalogueError>;
}

/// Decodes the payload of a base64 data URL into UTF-8 text.
///
/// # Errors
/// `InvalidUpload` if the URL has no payload, the payload is not base64, or
/// the decoded bytes are not UTF-8.
pub fn decode_data_url(filename: &str, contents: &str) -> Result<String, CatalogueError> {
    let invalid = |reason: String| CatalogueError::InvalidUpload {
        filename: filename.to_string(),
        reason,
    };

    let Some((header, payload)) = contents.split_once(',') else {
        return Err(invalid("missing ',' separator".to_string()));
    };
    if !header.ends_with(";base64") {
        return Err(invalid(format!("unsupported encoding header '{header}'")));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| invalid(format!("base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| invalid(format!("utf-8: {e}")))
}

/// Adapter for BIF documents from disk, memory, or uploads.
#[derive(Debug, Clone, Default)]
pub struct BifCatalogueAdapter {
    default_model: Option<PathBuf>,
}

impl BifCatalogueAdapter {
    /// Creates an adapter with an optional default network path.
    #[must_use]
    pub fn new(default_model: Option<PathBuf>) -> Self {
        Self { default_model }
    }

    /// Creates an adapter whose default network is `config.default_model`.
    #[must_use]
    pub fn from_config(config: &PanelConfig) -> Self {
        Self::new(config.default_model.clone())
    }

    fn load_path(path: &Path) -> Result<ModelCatalogue, CatalogueError> {
        let text = fs::read_to_string(path).map_err(|e| CatalogueError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        parse_bif(&name, &text)
    }
}

impl CatalogueAdapter for BifCatalogueAdapter {
    fn load_model(&self, source: &ModelSource) -> Result<ModelCatalogue, CatalogueError> {
        match source {
            ModelSource::Default => {
                let path = self
                    .default_model
                    .as_deref()
                    .ok_or(CatalogueError::NoDefaultModel)?;
                tracing::info!(path = %path.display(), "using default network");
                Self::load_path(path)
            }
            ModelSource::Path { path } => Self::load_path(path),
            ModelSource::Inline { name, content } => parse_bif(name, content),
            ModelSource::Upload { filename, contents } => {
                tracing::info!(filename = %filename, "loading uploaded network");
                let text = decode_data_url(filename, contents)?;
                parse_bif(filename, &text)
            }
        }
    }
}
