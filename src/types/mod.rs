// Public modules
pub mod completion_chunk;
pub mod completion_request;
pub mod model_spec;
pub mod server_props;

// Re-exports
pub use completion_chunk::{CompletionChunk, ServerErrorBody};
pub use completion_request::CompletionRequest;
pub use model_spec::ModelSpec;
pub use server_props::{HealthStatus, ServerProps};
