use crate::session::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub message: &'a str,
    pub session_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RenameSessionRequest<'a> {
    pub new_session_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
}

/// One stored turn as returned by the history endpoint. The role is kept
/// as a string so unknown roles can be skipped instead of failing the load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_shape() {
        let body = serde_json::to_value(SendMessageRequest {
            message: "What is in the PDF?",
            session_id: "session-1",
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({"message": "What is in the PDF?", "session_id": "session-1"})
        );
    }

    #[test]
    fn test_rename_request_shape() {
        let body = serde_json::to_value(RenameSessionRequest {
            new_session_id: "renamed",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"new_session_id": "renamed"}));
    }

    #[test]
    fn test_parse_history() {
        let history: Vec<HistoryEntry> = serde_json::from_str(
            r#"[{"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}]"#,
        )
        .unwrap();

        assert_eq!(
            history,
            vec![
                HistoryEntry::new("user", "hi"),
                HistoryEntry::new("assistant", "hello")
            ]
        );
    }

    #[test]
    fn test_parse_session_response() {
        let response: SessionResponse =
            serde_json::from_str(r#"{"session_id": "abc-123"}"#).unwrap();
        assert_eq!(response.session_id.as_str(), "abc-123");

        assert!(serde_json::from_str::<SessionResponse>(r#"{"session_id": ""}"#).is_err());
    }
}
