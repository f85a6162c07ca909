//! Output rendering for the chat front-end.
//!
//! This module provides the renderer trait the chat handler streams into and
//! a plain-text implementation for terminals.

use std::io::{self, Stdout, Write};

/// ANSI escape code for bold text (used for the assistant label).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Label printed in front of each assistant message.
const DEFAULT_LABEL: &str = "Assistant";

/// Trait for rendering one outbound assistant message at a time.
///
/// The handler calls [`send`](Renderer::send) once to open an empty message,
/// [`stream_token`](Renderer::stream_token) for every generated token, and
/// [`update`](Renderer::update) once the stream is exhausted.  A failed
/// exchange never reaches `update`.
pub trait Renderer: Send {
    /// Open an empty outbound message for the assistant's reply.
    fn send(&mut self);

    /// Append a chunk of generated text to the open message.
    fn stream_token(&mut self, token: &str);

    /// Commit the open message.
    fn update(&mut self);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
///
/// Tokens are written as they arrive and flushed immediately so the reply
/// appears incrementally.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    label: String,
    open: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            label: DEFAULT_LABEL.to_string(),
            open: false,
        }
    }

    /// Sets the label printed in front of each assistant message.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn send(&mut self) {
        let header = if self.use_color {
            format!("{ANSI_BOLD}{ANSI_CYAN}{}:{ANSI_RESET} ", self.label)
        } else {
            format!("{}: ", self.label)
        };
        self.write(&header);
        self.open = true;
    }

    fn stream_token(&mut self, token: &str) {
        self.write(token);
    }

    fn update(&mut self) {
        if self.open {
            self.write("\n");
            self.open = false;
        }
    }

    fn print_error(&mut self, error: &str) {
        // An aborted reply leaves the cursor mid-line.
        if self.open {
            self.write("\n");
            self.open = false;
        }
        if self.use_color {
            eprintln!("{ANSI_RED}Error:{ANSI_RESET} {error}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.write(&format!("{info}\n"));
    }
}
