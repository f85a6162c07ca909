use std::fmt;

use serde::{Deserialize, Serialize};

/// Default model repository.
pub const DEFAULT_MODEL_IDENTIFIER: &str = "zoltanctoth/orca_mini_3B-GGUF";

/// Default quantized weights file inside the model repository.
pub const DEFAULT_MODEL_FILE: &str = "orca-mini-3b.q4_0.gguf";

/// Identifies a pretrained model: a repository identifier and a weights file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSpec {
    /// Repository or family identifier, e.g. `zoltanctoth/orca_mini_3B-GGUF`.
    pub identifier: String,
    /// Quantized weights file, e.g. `orca-mini-3b.q4_0.gguf`.
    pub file: String,
}

impl ModelSpec {
    /// Create a new model spec.
    pub fn new(identifier: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            file: file.into(),
        }
    }

    /// Returns true if `path` names this spec's weights file.
    pub fn matches_path(&self, path: &str) -> bool {
        path.rsplit(['/', '\\'])
            .next()
            .is_some_and(|name| name == self.file)
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_IDENTIFIER, DEFAULT_MODEL_FILE)
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.identifier, self.file)
    }
}
