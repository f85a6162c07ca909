//! Per-session conversation state.
//!
//! A [`SessionState`] holds the assistant responses of completed exchanges,
//! in the order they happened.  It only ever grows: a new conversation means
//! a new `SessionState`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};
use time::OffsetDateTime;

use crate::Error;
use crate::error::Result;

/// Transcript format version written by [`SessionState::save_transcript_to`].
const TRANSCRIPT_VERSION: u8 = 1;

/// The ordered assistant responses of one chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    responses: Vec<String>,
}

impl SessionState {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded responses, oldest first.
    pub fn history(&self) -> &[String] {
        &self.responses
    }

    /// Appends the response of a completed exchange.
    pub fn record_response(&mut self, response: impl Into<String>) {
        self.responses.push(response.into());
    }

    /// Returns the number of recorded responses.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Returns true if no exchange has completed yet.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Returns the total size of the recorded responses in bytes.
    pub fn history_bytes(&self) -> usize {
        self.responses.iter().map(String::len).sum()
    }

    /// Saves the recorded responses to `path`.
    pub fn save_transcript_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let transcript = TranscriptFile::new(&self.responses);
        let file = File::create(path.as_ref())
            .map_err(|err| Error::io("failed to create transcript file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, &transcript).map_err(|err| {
            Error::serialization("failed to serialize transcript", Some(Box::new(err)))
        })
    }

    /// Creates a new session seeded with the responses stored at `path`.
    pub fn load_transcript_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|err| Error::io("failed to open transcript file", err))?;
        let reader = BufReader::new(file);
        let transcript: TranscriptFile = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(Error::validation(
                format!("unsupported transcript version {}", transcript.version),
                Some("version".to_string()),
            ));
        }
        Ok(Self {
            responses: transcript.responses,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct TranscriptFile {
    version: u8,
    #[serde(with = "crate::utils::time")]
    saved_at: OffsetDateTime,
    responses: Vec<String>,
}

impl TranscriptFile {
    fn new(responses: &[String]) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            saved_at: OffsetDateTime::now_utc(),
            responses: responses.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_empty() {
        let session = SessionState::new();
        assert!(session.is_empty());
        assert_eq!(session.len(), 0);
        assert!(session.history().is_empty());
    }

    #[test]
    fn record_response_appends() {
        let mut session = SessionState::new();
        session.record_response("Paris is the capital of France.");
        session.record_response("Berlin.");

        assert_eq!(session.len(), 2);
        assert_eq!(
            session.history(),
            &["Paris is the capital of France.", "Berlin."]
        );
    }

    #[test]
    fn record_response_keeps_prior_entries() {
        let mut session = SessionState::new();
        for i in 0..5 {
            session.record_response(format!("r{i}"));
        }
        let before = session.history().to_vec();
        session.record_response("last");
        assert_eq!(session.len(), before.len() + 1);
        assert_eq!(&session.history()[..before.len()], before.as_slice());
        assert_eq!(session.history().last().map(String::as_str), Some("last"));
    }

    #[test]
    fn empty_response_is_recorded() {
        let mut session = SessionState::new();
        session.record_response("");
        assert_eq!(session.len(), 1);
        assert_eq!(session.history_bytes(), 0);
    }

    #[test]
    fn transcript_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = SessionState::new();
        session.record_response("one");
        session.record_response("two");
        session.save_transcript_to(&path).unwrap();

        let loaded = SessionState::load_transcript_from(&path).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn transcript_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.json");
        std::fs::write(
            &path,
            r#"{"version":9,"saved_at":"2024-01-01T00:00:00Z","responses":[]}"#,
        )
        .unwrap();

        let err = SessionState::load_transcript_from(&path).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn transcript_missing_file() {
        let err = SessionState::load_transcript_from("/nonexistent/orca-chat.json").unwrap_err();
        assert!(err.to_string().contains("failed to open transcript file"));
    }
}
