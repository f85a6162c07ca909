//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the model.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Start a new session with an empty history.
    New,

    /// List the responses recorded in this session.
    History,

    /// Show the prompt that would be submitted for the given instruction.
    Prompt(String),

    /// Set or reset the system directive.
    /// `None` restores the default directive.
    System(Option<String>),

    /// Save the transcript to a specific file immediately.
    SaveTranscript(String),

    /// Display session statistics.
    Stats,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatInput<'a> {
    /// A slash command.
    Command(ChatCommand),
    /// Text for the model, forwarded as typed.
    Message(&'a str),
}

/// Classifies a line of user input.
///
/// Anything that is not a command is a message and is returned untouched.  A
/// leading `//` escapes a message that starts with `/`; one slash is dropped.
///
/// ```
/// # use orca_chat::chat::{ChatCommand, ChatInput, parse_input};
/// assert_eq!(parse_input("/quit"), ChatInput::Command(ChatCommand::Quit));
/// assert_eq!(parse_input("//etc/hosts?"), ChatInput::Message("/etc/hosts?"));
/// assert_eq!(parse_input("  Hi  "), ChatInput::Message("  Hi  "));
/// ```
pub fn parse_input(line: &str) -> ChatInput<'_> {
    let indent = line.len() - line.trim_start().len();
    if line[indent..].starts_with("//") {
        return ChatInput::Message(&line[indent + 1..]);
    }
    match parse_command(line) {
        Some(command) => ChatInput::Command(command),
        None => ChatInput::Message(line),
    }
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use orca_chat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/save chat.json").is_some());
/// assert!(parse_command("What is the capital of France?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    if rest.starts_with('/') {
        return None;
    }
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" | "reset" => ChatCommand::New,
        "history" => ChatCommand::History,
        "prompt" => match argument {
            Some(instruction) => ChatCommand::Prompt(instruction.to_string()),
            None => ChatCommand::Invalid("/prompt requires an instruction".to_string()),
        },
        "system" => ChatCommand::System(argument.map(|s| s.to_string())),
        "save" => match argument {
            Some(arg) => ChatCommand::SaveTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/save requires a file path".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new conversation
  /history               List the assistant replies kept as context
  /prompt <text>         Show the prompt that would be sent for <text>
  /system [prompt]       Set the system directive (no argument restores the default)
  /save <file>           Save the current transcript immediately
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat
  //text                 Send text that starts with "/" to the model"#
}
