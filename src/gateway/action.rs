//! Gateway wire protocol
//!
//! Every request is a single JSON document `{ "action": ..., ...params }`.
//! Every JSON response carries a `status` discriminator, except on gateway
//! deployments that predate the action being invoked.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::{GatewayError, RemoteEntry};

/// Closed set of gateway actions, one variant per action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action")]
pub enum GatewayAction {
    #[serde(rename = "list", rename_all = "camelCase")]
    List { folder_id: String },

    #[serde(rename = "upload", rename_all = "camelCase")]
    Upload {
        folder_id: String,
        filename: String,
        mime_type: String,
        /// Base64-encoded file content
        file: String,
    },

    #[serde(rename = "createFolder", rename_all = "camelCase")]
    CreateFolder { folder_id: String, name: String },

    #[serde(rename = "ensureFolder", rename_all = "camelCase")]
    EnsureFolder { root_id: String, name: String },

    #[serde(rename = "renameFolder", rename_all = "camelCase")]
    RenameFolder { id: String, name: String },

    #[serde(rename = "delete", rename_all = "camelCase")]
    Delete { id: String },

    #[serde(rename = "check_health")]
    CheckHealth,
}

impl GatewayAction {
    /// Wire name of the action, for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            GatewayAction::List { .. } => "list",
            GatewayAction::Upload { .. } => "upload",
            GatewayAction::CreateFolder { .. } => "createFolder",
            GatewayAction::EnsureFolder { .. } => "ensureFolder",
            GatewayAction::RenameFolder { .. } => "renameFolder",
            GatewayAction::Delete { .. } => "delete",
            GatewayAction::CheckHealth => "check_health",
        }
    }
}

/// Success payload of an action (the whole response object)
pub type Payload = Map<String, Value>;

/// `list` success payload
#[derive(Debug, Deserialize)]
pub(crate) struct ListPayload {
    #[serde(default)]
    pub files: Vec<RemoteEntry>,
}

/// `ensureFolder` success payload
#[derive(Debug, Deserialize)]
pub(crate) struct EnsureFolderPayload {
    #[serde(default)]
    pub id: Option<String>,
}

/// Decide what a parsed gateway response means.
///
/// | status            | message | result        |
/// |-------------------|---------|---------------|
/// | success           | any     | payload       |
/// | error             | any     | Remote        |
/// | absent / unknown  | present | Remote        |
/// | absent / unknown  | absent  | Compatibility |
pub fn classify_response(action: &str, body: Value) -> Result<Payload, GatewayError> {
    let Value::Object(object) = body else {
        return Err(GatewayError::Compatibility(format!(
            "'{}' returned an unexpected response shape",
            action
        )));
    };

    let message = error_message(&object);
    let status = object.get("status").and_then(Value::as_str).map(str::to_string);

    match status.as_deref() {
        Some("success") => Ok(object),
        Some("error") => Err(GatewayError::Remote(
            message.unwrap_or_else(|| "Unknown gateway error".to_string()),
        )),
        _ => match message {
            Some(message) => Err(GatewayError::Remote(message)),
            None => Err(GatewayError::Compatibility(format!(
                "the deployed gateway does not support '{}'",
                action
            ))),
        },
    }
}

fn error_message(object: &Map<String, Value>) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_wire_format() {
        let list = serde_json::to_value(GatewayAction::List { folder_id: "F1".into() }).unwrap();
        assert_eq!(list, json!({"action": "list", "folderId": "F1"}));

        let ensure = serde_json::to_value(GatewayAction::EnsureFolder {
            root_id: "R".into(),
            name: "Student - Ada [1]".into(),
        })
        .unwrap();
        assert_eq!(
            ensure,
            json!({"action": "ensureFolder", "rootId": "R", "name": "Student - Ada [1]"})
        );

        let upload = serde_json::to_value(GatewayAction::Upload {
            folder_id: "F1".into(),
            filename: "a.txt".into(),
            mime_type: "text/plain".into(),
            file: "aGk=".into(),
        })
        .unwrap();
        assert_eq!(
            upload,
            json!({
                "action": "upload",
                "folderId": "F1",
                "filename": "a.txt",
                "mimeType": "text/plain",
                "file": "aGk="
            })
        );

        let health = serde_json::to_value(GatewayAction::CheckHealth).unwrap();
        assert_eq!(health, json!({"action": "check_health"}));
    }

    #[test]
    fn test_action_names_match_wire() {
        let actions = [
            GatewayAction::List { folder_id: "x".into() },
            GatewayAction::CreateFolder { folder_id: "x".into(), name: "n".into() },
            GatewayAction::RenameFolder { id: "x".into(), name: "n".into() },
            GatewayAction::Delete { id: "x".into() },
            GatewayAction::CheckHealth,
        ];
        for action in actions {
            let value = serde_json::to_value(&action).unwrap();
            assert_eq!(value["action"], action.name());
        }
    }

    #[test]
    fn test_classify_success() {
        let payload = classify_response("list", json!({"status": "success", "files": []})).unwrap();
        assert!(payload.contains_key("files"));
    }

    #[test]
    fn test_classify_error_with_message() {
        let err = classify_response("delete", json!({"status": "error", "message": "No access"}))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Remote(ref m) if m == "No access"));
    }

    #[test]
    fn test_classify_error_without_message() {
        let err = classify_response("delete", json!({"status": "error"})).unwrap_err();
        assert!(matches!(err, GatewayError::Remote(_)));
    }

    #[test]
    fn test_classify_message_without_status() {
        let err = classify_response("list", json!({"message": "Folder not found"})).unwrap_err();
        assert!(matches!(err, GatewayError::Remote(ref m) if m == "Folder not found"));

        let err = classify_response("list", json!({"error": {"message": "Quota exceeded"}}))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Remote(ref m) if m == "Quota exceeded"));
    }

    #[test]
    fn test_classify_empty_object_is_compatibility() {
        let err = classify_response("renameFolder", json!({})).unwrap_err();
        assert!(err.is_compatibility());
        assert!(err.to_string().contains("renameFolder"));
    }

    #[test]
    fn test_classify_non_object_is_compatibility() {
        let err = classify_response("list", json!([1, 2, 3])).unwrap_err();
        assert!(err.is_compatibility());
    }
}
