use serde::{Deserialize, Serialize};

/// Response of `GET /health`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// `"ok"` once the model is ready.
    #[serde(default)]
    pub status: String,
}

impl HealthStatus {
    /// Returns true when the server reports it is ready to serve completions.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// The subset of `GET /props` this crate relies on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerProps {
    /// Path of the GGUF file the server loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,

    /// Context window of each slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_ctx: Option<u32>,
}
