// Public modules
pub mod chat;
pub mod client;
pub mod engine;
pub mod error;
pub mod observability;
pub mod prompt;
pub mod render;
pub mod sse;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{LlamaServer, SamplingOptions};
pub use engine::{InferenceEngine, TokenStream};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use prompt::{PromptTemplate, build_prompt};
pub use render::{PlainTextRenderer, Renderer};
pub use types::*;
