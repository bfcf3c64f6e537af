//! Core traits for docchat abstractions.
//!
//! These traits define the seams between the session logic and the outside
//! world: the document-chat HTTP API and the user's confirmations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// API
// =============================================================================

/// Callback receiving `(bytes_sent, total_bytes)` while an upload body streams.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A single file body handed to [`KnowledgeApi::upload_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub data: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// The document-chat server API.
///
/// Implementations map server-reported failures to `Error::Api` and transport
/// failures to `Error::Request`; nothing is retried.
#[async_trait]
pub trait KnowledgeApi: Send + Sync {
    /// Enumerate all stores and the server's active store.
    async fn list_stores(&self) -> Result<StoreListing>;

    /// Create a store with the given display name.
    async fn create_store(&self, name: &str) -> Result<CreatedStore>;

    /// Permanently delete a store.
    async fn delete_store(&self, store_id: &str) -> Result<()>;

    /// Tell the server which store is active.
    async fn set_active_store(&self, store_id: &str) -> Result<()>;

    /// List the files of one store.
    async fn list_files(&self, store_id: &str) -> Result<Vec<FileRecord>>;

    /// Upload one file into the server's active store.
    async fn upload_file(&self, upload: FileUpload, progress: ProgressCallback) -> Result<()>;

    /// Run one chat turn against the active store.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatAnswer>;

    /// Generate prompt suggestions for a store.
    async fn suggestions(&self, store_id: &str) -> Result<Vec<String>>;

    /// List available generation models.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>>;

    /// Store the model provider credential on the server.
    async fn set_api_key(&self, key: &str) -> Result<()>;

    /// Whether the server has a credential configured.
    async fn has_api_key(&self) -> Result<bool>;

    /// Liveness ping.
    async fn heartbeat(&self) -> Result<()>;

    /// Ask the server process to exit.
    async fn shutdown(&self) -> Result<()>;
}

// =============================================================================
// USER INTERACTION
// =============================================================================

/// Source of yes/no confirmations for irreversible actions.
pub trait Prompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Prompt that always gives the same answer (scripts, `--yes`, tests).
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Prompt for FixedAnswer {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_upload_size() {
        let upload = FileUpload::new("a.txt", vec![0u8; 12]);
        assert_eq!(upload.size(), 12);
    }

    #[test]
    fn test_fixed_answer() {
        assert!(FixedAnswer(true).confirm("Delete?"));
        assert!(!FixedAnswer(false).confirm("Delete?"));
    }

    #[test]
    fn test_api_is_object_safe() {
        fn assert_object_safe(_: Option<&dyn KnowledgeApi>) {}
        assert_object_safe(None);
    }
}
