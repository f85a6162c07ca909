//! Interactive chat with a locally served quantized model.
//!
//! This binary attaches to a llama.cpp-compatible completion server that has
//! the model loaded and provides a streaming REPL on top of it.
//!
//! # Usage
//!
//! ```bash
//! # Start the server with the default model, then chat
//! llama-server -m orca-mini-3b.q4_0.gguf --port 8080
//! orca-chat
//!
//! # Point at another server and weights file
//! orca-chat --server http://127.0.0.1:9000 --model-file orca_mini_v3_7b.Q4_K_M.gguf
//!
//! # Resume a conversation and keep saving it
//! orca-chat --transcript chat.json
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/new` - Start a new conversation
//! - `/history` - List the replies kept as context
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application
//! - `//text` - Send text that starts with `/` to the model

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use orca_chat::LlamaServer;
use orca_chat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatHandler, ChatInput, PlainTextRenderer, Renderer,
    SessionState, help_text, parse_input,
};

/// Main entry point for the orca-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (args, _) = ChatArgs::from_command_line_relaxed("orca-chat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    println!("Loading {} from {} ...", config.model, config.server_url);
    let engine =
        LlamaServer::load(&config.server_url, config.model.clone(), config.sampling()).await?;
    let mut handler = ChatHandler::from_config(Arc::new(engine), &config);

    match config.transcript_path.as_deref().filter(|path| path.exists()) {
        Some(path) => {
            let session = SessionState::load_transcript_from(path)?;
            renderer.print_info(&format!(
                "Resumed {} replies from {}",
                session.len(),
                path.display()
            ));
            handler.resume(session);
        }
        None => handler.on_chat_start(),
    }

    let mut rl = DefaultEditor::new()?;
    println!("orca-chat (model: {})", config.model);
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line.as_str());

                match parse_input(&line) {
                    ChatInput::Command(cmd) => match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::New => {
                            handler.on_chat_start();
                            renderer.print_info("Started a new conversation.");
                        }
                        ChatCommand::History => {
                            print_history(handler.session());
                        }
                        ChatCommand::Prompt(instruction) => {
                            print!("{}", handler.prompt_for(&instruction));
                        }
                        ChatCommand::System(prompt) => {
                            handler.set_system_prompt(prompt.clone());
                            match prompt {
                                Some(p) => {
                                    renderer.print_info(&format!("System prompt set to: {p}"))
                                }
                                None => renderer.print_info("System prompt reset to default."),
                            }
                        }
                        ChatCommand::SaveTranscript(path) => {
                            match handler.save_transcript_to(&path) {
                                Ok(_) => renderer.print_info(&format!("Transcript saved to {path}")),
                                Err(err) => renderer
                                    .print_error(&format!("Failed to save transcript: {err}")),
                            }
                        }
                        ChatCommand::Stats => {
                            print_stats(&handler);
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    },
                    // Forwarded exactly as typed.
                    ChatInput::Message(instruction) => {
                        if let Err(e) = handler.on_message(instruction, &mut renderer).await {
                            renderer.print_error(&e.to_string());
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so they never interleave with streamed tokens.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_history(session: &SessionState) {
    if session.is_empty() {
        println!("    (no replies yet)");
        return;
    }
    for (i, response) in session.history().iter().enumerate() {
        println!("    {}. {}", i + 1, response.trim());
    }
}

fn print_stats(handler: &ChatHandler<LlamaServer>) {
    let stats = handler.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!("      Server: {}", handler.engine().base_url());
    match handler.engine().context_size() {
        Some(n_ctx) => println!("      Context size: {n_ctx}"),
        None => println!("      Context size: (unknown)"),
    }
    println!("      Exchanges: {}", stats.exchanges);
    println!("      History: {} bytes", stats.history_bytes);
    println!("      Tokens streamed: {}", stats.tokens_streamed);
    println!("      Failed exchanges: {}", stats.failed_exchanges);
    println!("      System prompt: {}", stats.system_prompt);
    match stats.transcript_path {
        Some(ref path) => println!("      Transcript file: {}", path.display()),
        None => println!("      Transcript file: (disabled)"),
    }
}
