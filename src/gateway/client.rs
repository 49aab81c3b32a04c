//! HTTP client for the gateway endpoint
//!
//! One POST per action. Responses are classified in a fixed order: markup
//! content type, non-JSON body, then the `status` table in `classify_response`.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::action::{classify_response, EnsureFolderPayload, GatewayAction, ListPayload, Payload};
use super::types::{strip_url_query, GatewayError, RemoteEntry};
use super::GatewayBackend;
use crate::config::ConfigStore;
use crate::upload::EncodedPayload;

/// Request body content type. Plain text keeps browsers and proxies from
/// issuing a CORS preflight the gateway cannot answer.
const REQUEST_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// Gateway client bound to the process-wide configuration
pub struct GatewayClient {
    client: reqwest::Client,
    config: Arc<ConfigStore>,
}

impl GatewayClient {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        // No client-wide timeout: ordinary operations run to completion
        Self { client: reqwest::Client::new(), config }
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// Execute one action against the configured endpoint
    pub async fn invoke(&self, action: &GatewayAction) -> Result<Payload, GatewayError> {
        let config = self.config.require().await?;
        let body = self.post_json(&config.endpoint_url, action, None).await?;
        classify_response(action.name(), body)
    }

    /// POST an action and return the parsed JSON body without interpreting `status`.
    ///
    /// Markup and non-JSON responses fail with `Protocol`, network failures with
    /// `Transport`, and an elapsed `timeout` with `Timeout`.
    pub async fn post_json(
        &self,
        endpoint: &str,
        action: &GatewayAction,
        timeout: Option<Duration>,
    ) -> Result<Value, GatewayError> {
        let body = serde_json::to_string(action)
            .map_err(|e| GatewayError::InvalidEntry(format!("Failed to encode request: {}", e)))?;

        debug!("Gateway {} -> {}", action.name(), strip_url_query(endpoint));

        let mut request = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, REQUEST_CONTENT_TYPE)
            .body(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();

        if is_markup_content_type(response.headers().get(CONTENT_TYPE)) {
            return Err(markup_error(status.as_u16()));
        }

        let text = response.text().await?;
        if looks_like_markup(&text) {
            return Err(markup_error(status.as_u16()));
        }

        serde_json::from_str(&text).map_err(|_| {
            GatewayError::Protocol(format!(
                "Gateway returned a non-JSON response (HTTP {})",
                status.as_u16()
            ))
        })
    }
}

fn markup_error(status: u16) -> GatewayError {
    GatewayError::Protocol(format!(
        "Gateway returned an HTML page (HTTP {}); check the endpoint URL and that it is deployed for anonymous access",
        status
    ))
}

/// Whether a response content type denotes a markup document
pub(crate) fn is_markup_content_type(value: Option<&HeaderValue>) -> bool {
    let Some(value) = value.and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    matches!(mime.as_str(), "text/html" | "application/xhtml+xml")
}

/// Catch HTML bodies served under a mislabelled content type
fn looks_like_markup(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(15).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

#[async_trait]
impl GatewayBackend for GatewayClient {
    async fn list(&self, folder_id: &str) -> Result<Vec<RemoteEntry>, GatewayError> {
        let payload = self
            .invoke(&GatewayAction::List { folder_id: folder_id.to_string() })
            .await?;
        let list: ListPayload = serde_json::from_value(Value::Object(payload)).map_err(|e| {
            GatewayError::Compatibility(format!("unexpected 'list' payload: {}", e))
        })?;
        Ok(list.files)
    }

    async fn upload(&self, folder_id: &str, file: &EncodedPayload) -> Result<(), GatewayError> {
        self.invoke(&GatewayAction::Upload {
            folder_id: folder_id.to_string(),
            filename: file.filename.clone(),
            mime_type: file.mime_type.clone(),
            file: file.data.clone(),
        })
        .await?;
        info!("Uploaded {} ({} bytes) to {}", file.filename, file.size, folder_id);
        Ok(())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<(), GatewayError> {
        self.invoke(&GatewayAction::CreateFolder {
            folder_id: parent_id.to_string(),
            name: name.to_string(),
        })
        .await?;
        info!("Created folder '{}' in {}", name, parent_id);
        Ok(())
    }

    async fn ensure_folder(&self, root_id: &str, name: &str) -> Result<String, GatewayError> {
        let payload = self
            .invoke(&GatewayAction::EnsureFolder {
                root_id: root_id.to_string(),
                name: name.to_string(),
            })
            .await?;
        let ensured: EnsureFolderPayload = serde_json::from_value(Value::Object(payload))
            .map_err(|e| {
                GatewayError::Compatibility(format!("unexpected 'ensureFolder' payload: {}", e))
            })?;

        match ensured.id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(GatewayError::Compatibility(
                "'ensureFolder' succeeded without returning a folder id".to_string(),
            )),
        }
    }

    async fn rename_folder(&self, id: &str, name: &str) -> Result<(), GatewayError> {
        self.invoke(&GatewayAction::RenameFolder {
            id: id.to_string(),
            name: name.to_string(),
        })
        .await?;
        info!("Renamed {} to '{}'", id, name);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        self.invoke(&GatewayAction::Delete { id: id.to_string() }).await?;
        info!("Deleted {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GatewayClient {
        let config = GatewayConfig::new(format!("{}/exec", server.uri()), "ROOT");
        GatewayClient::new(Arc::new(ConfigStore::new(config)))
    }

    #[test]
    fn test_markup_content_types() {
        let html = HeaderValue::from_static("text/html; charset=utf-8");
        let xhtml = HeaderValue::from_static("application/xhtml+xml");
        let json = HeaderValue::from_static("application/json");
        assert!(is_markup_content_type(Some(&html)));
        assert!(is_markup_content_type(Some(&xhtml)));
        assert!(!is_markup_content_type(Some(&json)));
        assert!(!is_markup_content_type(None));
    }

    #[test]
    fn test_looks_like_markup() {
        assert!(looks_like_markup("  <!DOCTYPE html><html></html>"));
        assert!(looks_like_markup("<HTML><body>Sign in</body></HTML>"));
        assert!(!looks_like_markup("{\"status\":\"success\"}"));
        assert!(!looks_like_markup(""));
    }

    #[tokio::test]
    async fn test_list_sends_action_and_parses_files() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", REQUEST_CONTENT_TYPE))
            .and(body_json(json!({"action": "list", "folderId": "F1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "files": [
                    {"id": "a", "name": "Week 1", "mimeType": "application/vnd.google-apps.folder"},
                    {
                        "id": "b",
                        "name": "notes.txt",
                        "mimeType": "text/plain",
                        "url": "https://d/b",
                        "size": 12
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let files = client_for(&server).list("F1").await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].is_folder());
        assert_eq!(files[1].size, 12);
    }

    #[tokio::test]
    async fn test_slow_operation_runs_to_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "files": []}))
                    .set_delay(Duration::from_millis(700)),
            )
            .mount(&server)
            .await;

        let files = client_for(&server).list("F1").await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_html_response_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><body>Sign in to continue</body></html>",
                "text/html; charset=utf-8",
            ))
            .mount(&server)
            .await;

        let err = client_for(&server).list("F1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)), "got {:?}", err);
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_empty_html_response_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/html"))
            .mount(&server)
            .await;

        let err = client_for(&server).delete("X").await.unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_non_json_body_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal failure"))
            .mount(&server)
            .await;

        let err = client_for(&server).list("F1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(ref m) if m.contains("500")));
    }

    #[tokio::test]
    async fn test_remote_error_message_is_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "message": "Folder is not empty"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).delete("X").await.unwrap_err();
        assert_eq!(err.to_string(), "Folder is not empty");
    }

    #[tokio::test]
    async fn test_rename_on_old_gateway_is_compatibility_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"action": "renameFolder", "id": "F9", "name": "Week 2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = client_for(&server).rename_folder("F9", "Week 2").await.unwrap_err();
        assert!(err.is_compatibility(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_ensure_folder_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "action": "ensureFolder",
                "rootId": "ROOT",
                "name": "Student - Ada [1]"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "success", "id": "F1"})),
            )
            .mount(&server)
            .await;

        let id = client_for(&server).ensure_folder("ROOT", "Student - Ada [1]").await.unwrap();
        assert_eq!(id, "F1");
    }

    #[tokio::test]
    async fn test_ensure_folder_without_id_is_compatibility_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .mount(&server)
            .await;

        let err = client_for(&server).ensure_folder("ROOT", "x").await.unwrap_err();
        assert!(err.is_compatibility());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop a listener so the port is closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let config = GatewayConfig::new(format!("http://127.0.0.1:{}/exec", port), "ROOT");
        let client = GatewayClient::new(Arc::new(ConfigStore::new(config)));

        let err = client.list("F1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)), "got {:?}", err);
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_missing_config_fails_before_any_call() {
        let client = GatewayClient::new(Arc::new(ConfigStore::new(GatewayConfig::default())));
        let err = client.list("F1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }
}
