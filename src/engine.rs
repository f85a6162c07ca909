//! The inference engine seam.
//!
//! The chat handler never talks to a model directly.  It submits a prompt to an
//! [`InferenceEngine`] and consumes the returned [`TokenStream`] one token at a
//! time.  [`crate::LlamaServer`] is the engine used by the binary; tests
//! substitute scripted engines.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;

use crate::Result;
use crate::types::ModelSpec;

/// A single-pass stream of generated text fragments.
///
/// The stream ends when the engine signals end-of-generation.  An `Err` item
/// aborts the completion; callers must not poll past it.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A loaded model that produces streaming text completions.
#[async_trait::async_trait]
pub trait InferenceEngine: Send + Sync {
    /// The model this engine serves.
    fn model(&self) -> &ModelSpec;

    /// Start generating a completion for `prompt`.
    ///
    /// Fails if the request cannot be submitted; failures after submission are
    /// reported as items of the returned stream.
    async fn stream_complete(&self, prompt: &str) -> Result<TokenStream>;
}

#[async_trait::async_trait]
impl<E: InferenceEngine + ?Sized> InferenceEngine for Arc<E> {
    fn model(&self) -> &ModelSpec {
        (**self).model()
    }

    async fn stream_complete(&self, prompt: &str) -> Result<TokenStream> {
        (**self).stream_complete(prompt).await
    }
}
