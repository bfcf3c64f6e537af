//! In-memory `KnowledgeApi` for deterministic testing.
//!
//! Behaves like the reference server: creating a store makes it active,
//! uploads land in the active store and bump its file count, deleting the
//! active store clears the active pointer. Two switches model slower
//! servers: a store listing that lags behind creates, and creates that leave
//! the active store alone.
//!
//! ## Usage
//!
//! ```ignore
//! use docchat_core::mock::MockApi;
//!
//! let api = MockApi::new()
//!     .with_store("fileSearchStores/1", "Research")
//!     .with_failing_upload("broken.pdf");
//! assert_eq!(api.call_count("upload_file"), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::{FileUpload, KnowledgeApi, ProgressCallback};

/// Recorded call made against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

#[derive(Debug, Default)]
struct MockServerState {
    stores: Vec<Store>,
    active_store_id: Option<String>,
    files: HashMap<String, Vec<FileRecord>>,
    /// Stores created through the API (hidden from listings when lagging).
    created: HashSet<String>,
    next_store: usize,
    has_key: bool,
}

#[derive(Debug, Clone)]
struct MockConfig {
    models: Vec<ModelDescriptor>,
    chat_reply: std::result::Result<ChatAnswer, String>,
    suggestions: Vec<String>,
    failing_uploads: HashSet<String>,
    fail_create_store: bool,
    fail_all: bool,
    lagging_listing: bool,
    activate_on_create: bool,
    latency_ms: u64,
    chunk_size: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            chat_reply: Ok(ChatAnswer {
                text: "Mock response".to_string(),
                citations: Vec::new(),
            }),
            suggestions: Vec::new(),
            failing_uploads: HashSet::new(),
            fail_create_store: false,
            fail_all: false,
            lagging_listing: false,
            activate_on_create: true,
            latency_ms: 0,
            chunk_size: 4,
        }
    }
}

/// Mock document-chat server.
#[derive(Clone)]
pub struct MockApi {
    config: Arc<MockConfig>,
    state: Arc<Mutex<MockServerState>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            state: Arc::new(Mutex::new(MockServerState::default())),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Seed an existing store.
    pub fn with_store(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let store = Store {
                file_count: Some(0),
                ..Store::new(id, name)
            };
            state.files.insert(store.id.clone(), Vec::new());
            state.stores.push(store);
        }
        self
    }

    /// Seed files into an existing store.
    pub fn with_files(self, store_id: &str, names: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let records: Vec<FileRecord> = names
                .iter()
                .map(|n| FileRecord {
                    uri: format!("{}/files/{}", store_id, n),
                    name: n.to_string(),
                })
                .collect();
            let count = records.len() as i64;
            state.files.insert(store_id.to_string(), records);
            if let Some(store) = state.stores.iter_mut().find(|s| s.id == store_id) {
                store.file_count = Some(count);
            }
        }
        self
    }

    /// Make the server report this store as active.
    pub fn with_active_store(self, id: impl Into<String>) -> Self {
        self.state.lock().unwrap().active_store_id = Some(id.into());
        self
    }

    pub fn with_models(mut self, models: Vec<ModelDescriptor>) -> Self {
        Arc::make_mut(&mut self.config).models = models;
        self
    }

    pub fn with_chat_answer(mut self, answer: ChatAnswer) -> Self {
        Arc::make_mut(&mut self.config).chat_reply = Ok(answer);
        self
    }

    /// Make chat return a server-reported error.
    pub fn with_chat_error(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).chat_reply = Err(message.into());
        self
    }

    pub fn with_suggestions(mut self, questions: &[&str]) -> Self {
        Arc::make_mut(&mut self.config).suggestions =
            questions.iter().map(|q| q.to_string()).collect();
        self
    }

    /// Reject uploads of this file name.
    pub fn with_failing_upload(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .failing_uploads
            .insert(name.into());
        self
    }

    pub fn with_failing_create_store(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_create_store = true;
        self
    }

    /// Leave stores created through the API out of `list_stores`, as an
    /// eventually consistent backend would right after a create.
    pub fn with_lagging_store_listing(mut self) -> Self {
        Arc::make_mut(&mut self.config).lagging_listing = true;
        self
    }

    /// Creating a store does not change the server's active store.
    pub fn without_activate_on_create(mut self) -> Self {
        Arc::make_mut(&mut self.config).activate_on_create = false;
        self
    }

    /// Every call fails as if the network were down.
    pub fn with_transport_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_all = true;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    pub fn with_key(self) -> Self {
        self.state.lock().unwrap().has_key = true;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of calls of one operation.
    pub fn call_count(&self, operation: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Inputs of every call of one operation, in call order.
    pub fn call_inputs(&self, operation: &str) -> Vec<String> {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.input.clone())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }

    /// Server-side active store.
    pub fn server_active_store(&self) -> Option<String> {
        self.state.lock().unwrap().active_store_id.clone()
    }

    /// Server-side file names of a store.
    pub fn server_files(&self, store_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(store_id)
            .map(|f| f.iter().map(|r| r.name.clone()).collect())
            .unwrap_or_default()
    }

    async fn enter(&self, operation: &str, input: &str) -> Result<()> {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
        });
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
        if self.config.fail_all {
            return Err(Error::Request("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KnowledgeApi for MockApi {
    async fn list_stores(&self) -> Result<StoreListing> {
        self.enter("list_stores", "").await?;
        let state = self.state.lock().unwrap();
        let stores = state
            .stores
            .iter()
            .filter(|s| !(self.config.lagging_listing && state.created.contains(&s.id)))
            .map(|s| Store {
                active: state.active_store_id.as_deref() == Some(s.id.as_str()),
                ..s.clone()
            })
            .collect();
        Ok(StoreListing {
            stores,
            active_store_id: state.active_store_id.clone(),
        })
    }

    async fn create_store(&self, name: &str) -> Result<CreatedStore> {
        self.enter("create_store", name).await?;
        if self.config.fail_create_store {
            return Err(Error::Api("quota exceeded".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.next_store += 1;
        let id = format!("fileSearchStores/new-{}", state.next_store);
        state.stores.push(Store {
            file_count: Some(0),
            ..Store::new(id.clone(), name)
        });
        state.files.insert(id.clone(), Vec::new());
        state.created.insert(id.clone());
        if self.config.activate_on_create {
            state.active_store_id = Some(id.clone());
        }
        Ok(CreatedStore {
            id,
            name: name.to_string(),
        })
    }

    async fn delete_store(&self, store_id: &str) -> Result<()> {
        self.enter("delete_store", store_id).await?;
        let mut state = self.state.lock().unwrap();
        let before = state.stores.len();
        state.stores.retain(|s| s.id != store_id);
        if state.stores.len() == before {
            return Err(Error::Api(format!("store {} not found", store_id)));
        }
        state.files.remove(store_id);
        state.created.remove(store_id);
        if state.active_store_id.as_deref() == Some(store_id) {
            state.active_store_id = None;
        }
        Ok(())
    }

    async fn set_active_store(&self, store_id: &str) -> Result<()> {
        self.enter("set_active_store", store_id).await?;
        self.state.lock().unwrap().active_store_id = Some(store_id.to_string());
        Ok(())
    }

    async fn list_files(&self, store_id: &str) -> Result<Vec<FileRecord>> {
        self.enter("list_files", store_id).await?;
        let state = self.state.lock().unwrap();
        Ok(state.files.get(store_id).cloned().unwrap_or_default())
    }

    async fn upload_file(&self, upload: FileUpload, progress: ProgressCallback) -> Result<()> {
        self.enter("upload_file", &upload.name).await?;
        let total = upload.size();
        if self.config.failing_uploads.contains(&upload.name) {
            // Fail after the first chunk, like a request rejected mid-body.
            if let Some(first) = upload.data.chunks(self.config.chunk_size.max(1)).next() {
                progress(first.len() as u64, total);
            }
            return Err(Error::Api(format!("could not index {}", upload.name)));
        }
        let mut sent = 0u64;
        for chunk in upload.data.chunks(self.config.chunk_size.max(1)) {
            sent += chunk.len() as u64;
            progress(sent, total);
        }
        if total == 0 {
            progress(0, 0);
        }

        let mut state = self.state.lock().unwrap();
        let Some(active) = state.active_store_id.clone() else {
            return Err(Error::Api(
                "No active store selected. Create or select a store first.".to_string(),
            ));
        };
        let files = state.files.entry(active.clone()).or_default();
        files.retain(|f| f.name != upload.name);
        files.push(FileRecord {
            uri: format!("{}/files/{}", active, upload.name),
            name: upload.name.clone(),
        });
        let count = files.len() as i64;
        if let Some(store) = state.stores.iter_mut().find(|s| s.id == active) {
            store.file_count = Some(count);
        }
        Ok(())
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatAnswer> {
        self.enter("chat", &request.message).await?;
        match &self.config.chat_reply {
            Ok(answer) => Ok(answer.clone()),
            Err(message) => Err(Error::Api(message.clone())),
        }
    }

    async fn suggestions(&self, store_id: &str) -> Result<Vec<String>> {
        self.enter("suggestions", store_id).await?;
        Ok(self.config.suggestions.clone())
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        self.enter("list_models", "").await?;
        Ok(self.config.models.clone())
    }

    async fn set_api_key(&self, key: &str) -> Result<()> {
        self.enter("set_api_key", key).await?;
        self.state.lock().unwrap().has_key = true;
        Ok(())
    }

    async fn has_api_key(&self) -> Result<bool> {
        self.enter("has_api_key", "").await?;
        Ok(self.state.lock().unwrap().has_key)
    }

    async fn heartbeat(&self) -> Result<()> {
        self.enter("heartbeat", "").await
    }

    async fn shutdown(&self) -> Result<()> {
        self.enter("shutdown", "").await
    }
}
