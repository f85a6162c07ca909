//! Prompt construction for instruction-tuned completion models.
//!
//! The model is driven with a plain-text template made of `### System:`,
//! `### User:` and `### Response:` sections.  Prior assistant responses are
//! folded into the user section so the model sees what it already said.

/// Directive used when no system prompt is configured.
pub const DEFAULT_SYSTEM: &str = "you are a Ai assistant that gives helpful answers. You answer the questions in a short and concise way";

/// Marker that opens the user turn.
pub const USER_MARKER: &str = "### User:\n";

/// Marker after which the model is expected to write its answer.
pub const RESPONSE_MARKER: &str = "\n\n### Response:\n";

/// Opens the history clause inside the user turn.
pub const HISTORY_PREFIX: &str = "This is the conversation history: ";

/// Separates the history clause from the instruction.
pub const HISTORY_SUFFIX: &str = ". now answer the question: ";

/// A prompt template with a configurable system directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTemplate {
    system: String,
}

impl PromptTemplate {
    /// Creates a template with the given system directive.
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
        }
    }

    /// Returns the system directive.
    pub fn system(&self) -> &str {
        &self.system
    }

    /// Renders the prompt for `instruction` given the prior responses in `history`.
    ///
    /// History entries are joined with no separator.  When `history` is empty
    /// the history clause is omitted entirely.
    pub fn render(&self, instruction: &str, history: &[String]) -> String {
        let history_len: usize = history.iter().map(String::len).sum();
        let mut prompt = String::with_capacity(
            self.system.len() + instruction.len() + history_len + 128,
        );
        prompt.push_str("### System:\n");
        prompt.push_str(&self.system);
        prompt.push_str("\n\n");
        prompt.push_str(USER_MARKER);
        if !history.is_empty() {
            prompt.push_str(HISTORY_PREFIX);
            for entry in history {
                prompt.push_str(entry);
            }
            prompt.push_str(HISTORY_SUFFIX);
        }
        prompt.push_str(instruction);
        prompt.push_str(RESPONSE_MARKER);
        prompt
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM)
    }
}

/// Renders a prompt with the default system directive.
pub fn build_prompt(instruction: &str, history: &[String]) -> String {
    PromptTemplate::default().render(instruction, history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_has_no_clause() {
        let prompt = build_prompt("Hi", &[]);
        assert!(!prompt.contains("conversation history"));
        assert!(prompt.ends_with("\n\n### User:\nHi\n\n### Response:\n"));
    }

    #[test]
    fn full_prompt_without_history() {
        let prompt = build_prompt("Hi", &[]);
        assert_eq!(
            prompt,
            format!("### System:\n{DEFAULT_SYSTEM}\n\n### User:\nHi\n\n### Response:\n")
        );
    }

    #[test]
    fn history_clause_precedes_instruction() {
        let history = vec!["Paris is the capital of France.".to_string()];
        let prompt = build_prompt("And Germany?", &history);
        assert!(prompt.contains(
            "This is the conversation history: Paris is the capital of France.. now answer the question: And Germany?"
        ));
        assert!(prompt.ends_with("And Germany?\n\n### Response:\n"));
    }

    #[test]
    fn history_entries_are_not_separated() {
        let history = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let prompt = build_prompt("next", &history);
        assert!(prompt.contains("history: onetwothree. now answer"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let history = vec!["a".to_string(), "b".to_string()];
        assert_eq!(build_prompt("q", &history), build_prompt("q", &history));
    }

    #[test]
    fn custom_system_directive() {
        let template = PromptTemplate::new("Reply in French.");
        let prompt = template.render("Hello", &[]);
        assert!(prompt.starts_with("### System:\nReply in French.\n\n### User:\n"));
        assert_eq!(template.system(), "Reply in French.");
    }

    #[test]
    fn default_template_matches_build_prompt() {
        let history = vec!["x".to_string()];
        assert_eq!(
            PromptTemplate::default().render("y", &history),
            build_prompt("y", &history)
        );
    }
}
