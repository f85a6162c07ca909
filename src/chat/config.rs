//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_SERVER_URL, SamplingOptions};
use crate::error::{Error, Result};
use crate::prompt::PromptTemplate;
use crate::types::ModelSpec;

/// Default maximum tokens per response.
const DEFAULT_MAX_TOKENS: u32 = 512;

/// Command-line arguments for the orca-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the completion server.
    #[arrrg(optional, "Completion server URL (default: http://127.0.0.1:8080/)", "URL")]
    pub server: Option<String>,

    /// Model repository identifier.
    #[arrrg(optional, "Model identifier (default: zoltanctoth/orca_mini_3B-GGUF)", "MODEL")]
    pub model: Option<String>,

    /// Quantized weights file the server must have loaded.
    #[arrrg(optional, "Model weights file (default: orca-mini-3b.q4_0.gguf)", "FILE")]
    pub model_file: Option<String>,

    /// System directive placed at the top of every prompt.
    #[arrrg(optional, "System directive for the prompt template", "PROMPT")]
    pub system: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 512)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature between 0.0 and 2.0", "TEMP")]
    pub temperature: Option<String>,

    /// Top-k sampling limit.
    #[arrrg(optional, "Top-k sampling limit", "K")]
    pub top_k: Option<u32>,

    /// Nucleus sampling threshold.
    #[arrrg(optional, "Top-p sampling threshold between 0.0 and 1.0", "P")]
    pub top_p: Option<String>,

    /// A string that ends generation.
    #[arrrg(optional, "Stop generating when this string is produced", "TEXT")]
    pub stop: Option<String>,

    /// Transcript file to resume from and auto-save to.
    #[arrrg(optional, "Resume from and auto-save the transcript at PATH", "PATH")]
    pub transcript: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Base URL of the completion server.
    pub server_url: String,

    /// The model the server must be serving.
    pub model: ModelSpec,

    /// Optional system directive; `None` uses the built-in one.
    pub system_prompt: Option<String>,

    /// Maximum tokens per response.
    pub max_tokens: Option<u32>,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Optional top-k sampling limit.
    pub top_k: Option<u32>,

    /// Optional top-p nucleus sampling value.
    pub top_p: Option<f32>,

    /// Stop sequences supplied on every request.
    pub stop_sequences: Vec<String>,

    /// Path to persist transcripts automatically after each exchange.
    pub transcript_path: Option<PathBuf>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Server: http://127.0.0.1:8080/
    /// - Model: zoltanctoth/orca_mini_3B-GGUF, orca-mini-3b.q4_0.gguf
    /// - Max tokens: 512
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            model: ModelSpec::default(),
            system_prompt: None,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            temperature: None,
            top_k: None,
            top_p: None,
            stop_sequences: Vec::new(),
            transcript_path: None,
            use_color: true,
        }
    }

    /// Sets the completion server URL.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Sets the model.
    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.model = model;
        self
    }

    /// Sets the system directive.
    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the top-k value.
    pub fn with_top_k(mut self, top_k: Option<u32>) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sets the top-p value.
    pub fn with_top_p(mut self, top_p: Option<f32>) -> Self {
        self.top_p = top_p;
        self
    }

    /// Sets the stop sequences.
    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    /// Sets the transcript auto-save path.
    pub fn with_transcript_path(mut self, path: Option<PathBuf>) -> Self {
        self.transcript_path = path;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Returns the prompt template for this configuration.
    pub fn template(&self) -> PromptTemplate {
        match &self.system_prompt {
            Some(system) => PromptTemplate::new(system.clone()),
            None => PromptTemplate::default(),
        }
    }

    /// Returns the sampling options sent to the engine.
    pub fn sampling(&self) -> SamplingOptions {
        SamplingOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            stop: self.stop_sequences.clone(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let defaults = ModelSpec::default();
        let model = ModelSpec::new(
            args.model.unwrap_or(defaults.identifier),
            args.model_file.unwrap_or(defaults.file),
        );
        let server_url = args
            .server
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        url::Url::parse(&server_url).map_err(|err| {
            Error::validation(format!("invalid server URL: {err}"), Some("server".to_string()))
        })?;
        let temperature = args
            .temperature
            .as_deref()
            .map(|arg| parse_f32_in_range(arg, 0.0, 2.0, "temperature"))
            .transpose()?;
        let top_p = args
            .top_p
            .as_deref()
            .map(|arg| parse_f32_in_range(arg, 0.0, 1.0, "top_p"))
            .transpose()?;

        Ok(ChatConfig {
            server_url,
            model,
            system_prompt: args.system,
            max_tokens: Some(args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            temperature,
            top_k: args.top_k,
            top_p,
            stop_sequences: args.stop.into_iter().collect(),
            transcript_path: args.transcript.map(PathBuf::from),
            use_color: !args.no_color,
        })
    }
}

fn parse_f32_in_range(arg: &str, min: f32, max: f32, param: &str) -> Result<f32> {
    let value = arg.parse::<f32>().map_err(|_| {
        Error::validation(format!("expects a number, got {arg:?}"), Some(param.to_string()))
    })?;
    if !(min..=max).contains(&value) {
        return Err(Error::validation(
            format!("must be between {min:.1} and {max:.1}"),
            Some(param.to_string()),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.server_url, "http://127.0.0.1:8080/");
        assert_eq!(config.model, ModelSpec::default());
        assert_eq!(config.max_tokens, Some(512));
        assert!(config.use_color);
        assert!(config.system_prompt.is_none());
        assert!(config.temperature.is_none());
        assert!(config.top_k.is_none());
        assert!(config.top_p.is_none());
        assert!(config.stop_sequences.is_empty());
        assert!(config.transcript_path.is_none());
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            server: Some("http://localhost:9090".to_string()),
            model: Some("TheBloke/orca_mini_v3_7B-GGUF".to_string()),
            model_file: Some("orca_mini_v3_7b.Q4_K_M.gguf".to_string()),
            system: Some("Answer in one word.".to_string()),
            max_tokens: Some(64),
            temperature: Some("0.7".to_string()),
            top_k: Some(40),
            top_p: Some("0.95".to_string()),
            stop: Some("### User:".to_string()),
            transcript: Some("chat.json".to_string()),
            no_color: true,
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.server_url, "http://localhost:9090");
        assert_eq!(
            config.model,
            ModelSpec::new("TheBloke/orca_mini_v3_7B-GGUF", "orca_mini_v3_7b.Q4_K_M.gguf")
        );
        assert_eq!(config.system_prompt.as_deref(), Some("Answer in one word."));
        assert_eq!(config.max_tokens, Some(64));
        assert_eq!(config.temperature, Some(0.7));
        assert_eq!(config.top_k, Some(40));
        assert_eq!(config.top_p, Some(0.95));
        assert_eq!(config.stop_sequences, vec!["### User:".to_string()]);
        assert_eq!(config.transcript_path, Some(PathBuf::from("chat.json")));
        assert!(!config.use_color);
    }

    #[test]
    fn config_rejects_out_of_range_top_p() {
        let args = ChatArgs {
            top_p: Some("1.5".to_string()),
            ..ChatArgs::default()
        };
        let err = ChatConfig::try_from(args).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("top_p"));
    }

    #[test]
    fn config_rejects_non_numeric_temperature() {
        let args = ChatArgs {
            temperature: Some("warm".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).unwrap_err().is_validation());
    }

    #[test]
    fn config_rejects_bad_url() {
        let args = ChatArgs {
            server: Some("localhost without scheme".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).unwrap_err().is_validation());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_server_url("http://10.0.0.2:8080/")
            .with_model(ModelSpec::new("org/repo", "w.gguf"))
            .with_system_prompt("Be brief.".to_string())
            .with_max_tokens(None)
            .with_temperature(Some(0.2))
            .with_top_k(Some(20))
            .with_top_p(Some(0.8))
            .with_stop_sequences(vec!["END".to_string()])
            .with_transcript_path(Some(PathBuf::from("t.json")))
            .without_color();

        assert_eq!(config.server_url, "http://10.0.0.2:8080/");
        assert_eq!(config.template().system(), "Be brief.");
        assert!(!config.use_color);
        assert_eq!(
            config.sampling(),
            SamplingOptions {
                max_tokens: None,
                temperature: Some(0.2),
                top_k: Some(20),
                top_p: Some(0.8),
                stop: vec!["END".to_string()],
            }
        );
        assert_eq!(config.transcript_path, Some(PathBuf::from("t.json")));
    }

    #[test]
    fn default_template() {
        assert_eq!(ChatConfig::new().template(), PromptTemplate::default());
    }
}
