//! Wire types for the document-chat server API.

use serde::{Deserialize, Serialize};

use docchat_core::{Citation, Error, FileRecord, ModelDescriptor, Result, Store};

/// `GET /api/stores`
#[derive(Debug, Clone, Deserialize)]
pub struct StoreListResponse {
    #[serde(default)]
    pub stores: Vec<Store>,
    #[serde(default)]
    pub active_store_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /api/stores`
#[derive(Debug, Clone, Serialize)]
pub struct CreateStoreRequest<'a> {
    pub name: &'a str,
}

/// `POST /api/stores/active`
#[derive(Debug, Clone, Serialize)]
pub struct SetActiveStoreRequest<'a> {
    pub store_id: &'a str,
}

/// `POST /api/set_key`
#[derive(Debug, Clone, Serialize)]
pub struct SetKeyRequest<'a> {
    #[serde(rename = "apiKey")]
    pub api_key: &'a str,
}

/// Generic `{status, error}` envelope returned by mutating endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusResponse {
    /// Turn `error` / `status: "error"` into `Error::Api`.
    pub fn into_result(self) -> Result<Self> {
        if let Some(error) = self.error {
            return Err(Error::Api(error));
        }
        if self.status.as_deref() == Some("error") {
            return Err(Error::Api(
                self.message
                    .unwrap_or_else(|| "Server reported an error".to_string()),
            ));
        }
        Ok(self)
    }
}

/// `GET /api/store/{id}/files`
#[derive(Debug, Clone, Deserialize)]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /api/chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub citations: Option<Vec<Citation>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /api/store/{id}/suggestions`
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionsResponse {
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/models`
#[derive(Debug, Clone, Deserialize)]
pub struct ModelListResponse {
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/has_key`
#[derive(Debug, Clone, Deserialize)]
pub struct HasKeyResponse {
    #[serde(default)]
    pub has_key: bool,
}

/// Body of a non-2xx response, when it is JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn text(self) -> Option<String> {
        self.error.or(self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_success() {
        let resp: StatusResponse =
            serde_json::from_str(r#"{"status":"success","id":"s1","name":"Docs"}"#).unwrap();
        let ok = resp.into_result().unwrap();
        assert_eq!(ok.id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_status_error_field() {
        let resp: StatusResponse = serde_json::from_str(r#"{"error":"Name required"}"#).unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Name required");
    }

    #[test]
    fn test_status_error_with_message() {
        let resp: StatusResponse =
            serde_json::from_str(r#"{"status":"error","message":"No key provided"}"#).unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.to_string(), "No key provided");
    }

    #[test]
    fn test_store_list_with_counts() {
        let resp: StoreListResponse = serde_json::from_str(
            r#"{"stores":[{"id":"s1","name":"Docs","file_count":2,"active":true}],"active_store_id":"s1"}"#,
        )
        .unwrap();
        assert_eq!(resp.stores[0].file_count, Some(2));
        assert_eq!(resp.active_store_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_chat_response_null_citations() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"response":"hi","citations":null}"#).unwrap();
        assert!(resp.citations.is_none());
    }

    #[test]
    fn test_set_key_wire_name() {
        let json = serde_json::to_value(SetKeyRequest { api_key: "k" }).unwrap();
        assert_eq!(json["apiKey"], "k");
    }
}
