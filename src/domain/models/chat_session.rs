use std::sync::Arc;

use serde_json::{json, Value};

use super::{truncate_history, ConversationTurn, SessionConfig};

/// Body of an ask request as received from the caller.
///
/// Both fields stay untyped JSON until the relay validates them, so a null or
/// non-text question is caught by the relay itself rather than trusted.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Value,
    #[serde(default)]
    pub history: Value,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: Value::String(question.into()),
            history: Value::Null,
        }
    }

    pub fn with_history(mut self, turns: &[ConversationTurn]) -> Self {
        self.history = Value::Array(
            turns
                .iter()
                .map(|t| json!({ "role": t.role().as_str(), "parts": t.parts() }))
                .collect(),
        );
        self
    }

    pub fn with_raw_history(mut self, history: Value) -> Self {
        self.history = history;
        self
    }
}

/// Per-request pairing of the shared configuration with one bounded history.
///
/// Built fresh for every request and dropped when the request ends; nothing
/// carries over between requests.
#[derive(Debug, Clone)]
pub struct ChatSession {
    config: Arc<SessionConfig>,
    history: Vec<ConversationTurn>,
    truncated: usize,
}

impl ChatSession {
    /// Oldest turns beyond `max_history_length` are dropped here.
    pub fn new(config: Arc<SessionConfig>, history: Vec<ConversationTurn>) -> Self {
        let original_len = history.len();
        let history = truncate_history(history, config.max_history_length());
        let truncated = original_len - history.len();
        Self {
            config,
            history,
            truncated,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Number of turns dropped by the history cap.
    pub fn truncated(&self) -> usize {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_applies_history_cap() {
        let config = Arc::new(SessionConfig::default().with_max_history_length(2));
        let history = vec![
            ConversationTurn::user("a"),
            ConversationTurn::model("b"),
            ConversationTurn::user("c"),
        ];
        let session = ChatSession::new(config, history);
        assert_eq!(session.history(), [ConversationTurn::model("b"), ConversationTurn::user("c")]);
        assert_eq!(session.truncated(), 1);
    }

    #[test]
    fn ask_request_serializes_turns() {
        let request = AskRequest::new("q").with_history(&[ConversationTurn::user("hi")]);
        assert_eq!(request.history, json!([{ "role": "user", "parts": ["hi"] }]));
    }

    #[test]
    fn ask_request_deserializes_with_missing_fields() {
        let request: AskRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.question, Value::Null);
        assert_eq!(request.history, Value::Null);
    }
}
