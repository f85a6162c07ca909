//! The request/response cycle.
//!
//! [`ChatHandler`] wires the prompt template, the session history, the
//! inference engine and a renderer together.  A host calls
//! [`on_chat_start`](ChatHandler::on_chat_start) when a conversation begins
//! and [`on_message`](ChatHandler::on_message) for every user message.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;

use crate::chat::config::ChatConfig;
use crate::chat::session::SessionState;
use crate::engine::InferenceEngine;
use crate::error::Result;
use crate::observability::{
    CHAT_EXCHANGE_ERRORS, CHAT_EXCHANGES, CHAT_SESSIONS, STREAM_BYTES, STREAM_DURATION,
    STREAM_ERRORS, STREAM_TOKENS, STREAM_TTFT,
};
use crate::prompt::PromptTemplate;
use crate::render::Renderer;
use crate::types::ModelSpec;

/// Aggregated stats for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The model serving the session.
    pub model: ModelSpec,
    /// Completed exchanges, equal to the number of recorded responses.
    pub exchanges: usize,
    /// Total size of the recorded responses in bytes.
    pub history_bytes: usize,
    /// Tokens received from the engine, including those of failed exchanges.
    pub tokens_streamed: u64,
    /// Exchanges that ended in an error.
    pub failed_exchanges: u64,
    /// The system directive in use.
    pub system_prompt: String,
    /// The auto-save transcript path, if set.
    pub transcript_path: Option<PathBuf>,
}

/// Drives chat exchanges against an inference engine.
///
/// One handler serves one session at a time; `on_message` borrows the handler
/// mutably, so exchanges on a session are strictly sequential.
pub struct ChatHandler<E: InferenceEngine> {
    engine: Arc<E>,
    template: PromptTemplate,
    session: SessionState,
    transcript_path: Option<PathBuf>,
    tokens_streamed: u64,
    failed_exchanges: u64,
}

impl<E: InferenceEngine> ChatHandler<E> {
    /// Creates a handler over `engine` with the default prompt template.
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            template: PromptTemplate::default(),
            session: SessionState::new(),
            transcript_path: None,
            tokens_streamed: 0,
            failed_exchanges: 0,
        }
    }

    /// Creates a handler configured from `config`.
    pub fn from_config(engine: Arc<E>, config: &ChatConfig) -> Self {
        Self::new(engine)
            .with_template(config.template())
            .with_transcript_path(config.transcript_path.clone())
    }

    /// Sets the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Sets the path the session is auto-saved to after each exchange.
    pub fn with_transcript_path(mut self, path: Option<PathBuf>) -> Self {
        self.transcript_path = path;
        self
    }

    /// Starts a new session with an empty history.
    pub fn on_chat_start(&mut self) {
        self.start(SessionState::new());
    }

    /// Starts a new session that continues from a previously saved one.
    pub fn resume(&mut self, session: SessionState) {
        self.start(session);
    }

    fn start(&mut self, session: SessionState) {
        CHAT_SESSIONS.click();
        tracing::debug!(history = session.len(), "session started");
        self.session = session;
        self.tokens_streamed = 0;
        self.failed_exchanges = 0;
    }

    /// Runs one exchange: builds the prompt, streams the reply into
    /// `renderer`, and records the reply in the session.
    ///
    /// On error the session is left unchanged and `renderer.update()` is not
    /// called.  Returns the full reply.
    pub async fn on_message(
        &mut self,
        instruction: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        let prompt = self.prompt_for(instruction);
        renderer.send();

        match self.stream_reply(&prompt, renderer).await {
            Ok(response) => {
                renderer.update();
                self.session.record_response(response.clone());
                CHAT_EXCHANGES.click();
                tracing::debug!(
                    exchange = self.session.len(),
                    response_bytes = response.len(),
                    "exchange completed"
                );
                if let Err(err) = self.auto_save_transcript() {
                    renderer.print_error(&format!("Failed to save transcript: {err}"));
                }
                Ok(response)
            }
            Err(err) => {
                CHAT_EXCHANGE_ERRORS.click();
                self.failed_exchanges += 1;
                tracing::warn!(error = %err, "exchange aborted");
                Err(err)
            }
        }
    }

    async fn stream_reply(&mut self, prompt: &str, renderer: &mut dyn Renderer) -> Result<String> {
        let started = Instant::now();
        let mut tokens = self.engine.stream_complete(prompt).await?;
        let mut response = String::new();
        let mut first = true;
        while let Some(token) = tokens.next().await {
            let token = token.inspect_err(|_| STREAM_ERRORS.click())?;
            if first {
                STREAM_TTFT.add(started.elapsed().as_secs_f64());
                first = false;
            }
            STREAM_TOKENS.click();
            STREAM_BYTES.count(token.len() as u64);
            self.tokens_streamed += 1;
            renderer.stream_token(&token);
            response.push_str(&token);
        }
        STREAM_DURATION.add(started.elapsed().as_secs_f64());
        Ok(response)
    }

    /// Returns the prompt `on_message` would submit for `instruction` now.
    pub fn prompt_for(&self, instruction: &str) -> String {
        self.template.render(instruction, self.session.history())
    }

    /// Returns the current session.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Returns the prompt template.
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Sets or resets the system directive.  `None` restores the default.
    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.template = match prompt {
            Some(prompt) => PromptTemplate::new(prompt),
            None => PromptTemplate::default(),
        };
    }

    /// Returns the configured transcript path, if any.
    pub fn transcript_path(&self) -> Option<&Path> {
        self.transcript_path.as_deref()
    }

    /// Saves the session transcript to `path`.
    pub fn save_transcript_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.session.save_transcript_to(path)
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.engine.model().clone(),
            exchanges: self.session.len(),
            history_bytes: self.session.history_bytes(),
            tokens_streamed: self.tokens_streamed,
            failed_exchanges: self.failed_exchanges,
            system_prompt: self.template.system().to_string(),
            transcript_path: self.transcript_path.clone(),
        }
    }

    fn auto_save_transcript(&self) -> Result<()> {
        if let Some(path) = &self.transcript_path {
            self.session.save_transcript_to(path)
        } else {
            Ok(())
        }
    }
}
