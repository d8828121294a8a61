use serde::{Deserialize, Serialize};

/// Event name under which file access checks are queried
pub const CHECK_FILE_ACCESS_EVENT: &str = "check-file-access";

/// Service name the authorization module registers under unless configured otherwise
pub const DEFAULT_AUTH_SERVICE: &str = "auth";

/// Question whether a session may read a file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileAccessRequest {
    /// Session which requests access
    pub session_id: String,
    /// File to be read
    pub file_id: String,
}

/// Answer to a [`FileAccessRequest`]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAccessResponse {
    /// Whether the file may be served
    pub allowed: bool,
}

impl FileAccessResponse {
    /// Positive answer
    pub const ALLOWED: Self = Self { allowed: true };
    /// Negative answer
    pub const DENIED: Self = Self { allowed: false };
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn use_camel_case_on_the_wire() {
        let request = FileAccessRequest {
            session_id: "s1".into(),
            file_id: "f1".into(),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "sessionId": "s1", "fileId": "f1" })
        );
    }

    #[test]
    fn require_boolean_answer() {
        assert!(serde_json::from_value::<FileAccessResponse>(json!({ "allowed": true })).is_ok());
        assert!(serde_json::from_value::<FileAccessResponse>(json!({ "allowed": "true" })).is_err());
        assert!(serde_json::from_value::<FileAccessResponse>(json!({})).is_err());
    }
}
