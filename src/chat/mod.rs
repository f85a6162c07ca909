//! Chat front-end for a locally served model.
//!
//! This module provides the conversation core and the pieces the REPL binary
//! is assembled from:
//!
//! - [`session`]: the per-session history of assistant responses
//! - [`handler`]: the streaming request/response cycle
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod handler;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, ChatInput, help_text, parse_command, parse_input};
pub use config::{ChatArgs, ChatConfig};
pub use handler::{ChatHandler, SessionStats};
pub use session::SessionState;
