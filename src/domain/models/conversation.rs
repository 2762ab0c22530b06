use serde_json::Value;

use crate::domain::DomainError;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "model" => Some(Role::Model),
            _ => None,
        }
    }
}

/// One prior turn of the conversation, as resupplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    role: Role,
    parts: Vec<String>,
}

impl ConversationTurn {
    pub fn new(role: Role, parts: Vec<String>) -> Self {
        Self { role, parts }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![text.into()])
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![text.into()])
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Validate one untrusted history element.
    ///
    /// Accepts `{"role": "user"|"model", "parts": [...]}` where each part is
    /// either a plain string or an object carrying a `text` string.
    pub fn from_value(value: &Value, index: usize) -> Result<Self, DomainError> {
        let obj = value.as_object().ok_or_else(|| {
            DomainError::invalid_input(format!("history[{index}] must be an object"))
        })?;

        let role = match obj.get("role") {
            Some(Value::String(s)) => Role::parse(s).ok_or_else(|| {
                DomainError::invalid_input(format!(
                    "history[{index}].role must be 'user' or 'model', got '{s}'"
                ))
            })?,
            Some(_) => {
                return Err(DomainError::invalid_input(format!(
                    "history[{index}].role must be a string"
                )))
            }
            None => {
                return Err(DomainError::invalid_input(format!(
                    "history[{index}] is missing 'role'"
                )))
            }
        };

        let raw_parts = match obj.get("parts") {
            Some(Value::Array(parts)) => parts,
            Some(_) => {
                return Err(DomainError::invalid_input(format!(
                    "history[{index}].parts must be an array"
                )))
            }
            None => {
                return Err(DomainError::invalid_input(format!(
                    "history[{index}] is missing 'parts'"
                )))
            }
        };

        let mut parts = Vec::with_capacity(raw_parts.len());
        for (j, part) in raw_parts.iter().enumerate() {
            let text = match part {
                Value::String(s) => s.clone(),
                Value::Object(o) => match o.get("text") {
                    Some(Value::String(s)) => s.clone(),
                    _ => {
                        return Err(DomainError::invalid_input(format!(
                            "history[{index}].parts[{j}] object must carry a 'text' string"
                        )))
                    }
                },
                _ => {
                    return Err(DomainError::invalid_input(format!(
                        "history[{index}].parts[{j}] must be text"
                    )))
                }
            };
            parts.push(text);
        }

        Ok(Self { role, parts })
    }
}

/// Keep only the most recent `max` turns, preserving their order.
pub fn truncate_history(mut history: Vec<ConversationTurn>, max: usize) -> Vec<ConversationTurn> {
    if history.len() > max {
        history.drain(..history.len() - max);
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_parts() {
        let turn = ConversationTurn::from_value(&json!({"role": "user", "parts": ["Hi"]}), 0)
            .unwrap();
        assert_eq!(turn, ConversationTurn::user("Hi"));
    }

    #[test]
    fn parses_object_parts() {
        let turn = ConversationTurn::from_value(
            &json!({"role": "model", "parts": [{"text": "Hello"}, "again"]}),
            0,
        )
        .unwrap();
        assert_eq!(turn.role(), Role::Model);
        assert_eq!(turn.parts(), ["Hello".to_string(), "again".to_string()]);
    }

    #[test]
    fn rejects_missing_role() {
        let err = ConversationTurn::from_value(&json!({"parts": ["Hi"]}), 3).unwrap_err();
        assert!(err.is_caller_error());
        assert!(err.to_string().contains("history[3]"));
    }

    #[test]
    fn rejects_unknown_role() {
        let err =
            ConversationTurn::from_value(&json!({"role": "system", "parts": ["Hi"]}), 0).unwrap_err();
        assert!(err.to_string().contains("'user' or 'model'"));
    }

    #[test]
    fn rejects_non_text_part() {
        let err =
            ConversationTurn::from_value(&json!({"role": "user", "parts": [42]}), 0).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn rejects_non_object_element() {
        assert!(ConversationTurn::from_value(&json!("hello"), 0).is_err());
        assert!(ConversationTurn::from_value(&Value::Null, 0).is_err());
    }

    #[test]
    fn truncate_keeps_most_recent_in_order() {
        let history: Vec<_> = (0..5).map(|i| ConversationTurn::user(i.to_string())).collect();
        let kept = truncate_history(history, 3);
        let texts: Vec<_> = kept.iter().map(|t| t.parts()[0].as_str()).collect();
        assert_eq!(texts, ["2", "3", "4"]);
    }

    #[test]
    fn truncate_is_noop_under_limit() {
        let history = vec![ConversationTurn::user("a"), ConversationTurn::model("b")];
        assert_eq!(truncate_history(history.clone(), 50), history);
    }

    #[test]
    fn truncate_to_zero_drops_everything() {
        let history = vec![ConversationTurn::user("a")];
        assert!(truncate_history(history, 0).is_empty());
    }
}
