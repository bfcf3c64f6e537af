//! Store and model synchronization.
//!
//! [`StateSync`] keeps [`SessionState`] in step with the server: the store
//! list (with optimistic entries for stores created this session), the active
//! store pointer, the active store's files and the model list.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use docchat_core::{
    defaults, CreatedStore, Error, FileRecord, KnowledgeApi, ModelDescriptor, Prompt, Result,
    Store,
};

use crate::state::{FileListing, SessionState};

/// Keeps the session's view of stores, files and models current.
#[derive(Clone)]
pub struct StateSync {
    api: Arc<dyn KnowledgeApi>,
    state: Arc<SessionState>,
}

impl StateSync {
    pub fn new(api: Arc<dyn KnowledgeApi>, state: Arc<SessionState>) -> Self {
        Self { api, state }
    }

    pub fn api(&self) -> &Arc<dyn KnowledgeApi> {
        &self.api
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    // -------------------------------------------------------------------------
    // Stores
    // -------------------------------------------------------------------------

    /// Fetch the store list and adopt the server's active store.
    ///
    /// Files are refreshed only when the active store changes or has not been
    /// loaded yet; callers that know the files changed call [`Self::list_files`].
    pub async fn list_stores(&self) -> Result<Vec<Store>> {
        let start = Instant::now();
        let listing = self.api.list_stores().await?;
        self.state.replace_stores(listing.stores).await;

        if let Some(active) = listing.active_store_id {
            let current = self.state.current_store_id().await;
            let unloaded = matches!(self.state.file_listing().await, FileListing::NoStore);
            if current.as_deref() != Some(active.as_str()) || unloaded {
                self.state.set_current_store(Some(active.clone())).await;
                self.list_files(&active).await;
            }
        }

        let stores = self.state.stores().await;
        debug!(
            subsystem = "sync",
            op = "list_stores",
            result_count = stores.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Store list refreshed"
        );
        Ok(stores)
    }

    /// Make `store_id` active on the server and locally, then load its files.
    pub async fn set_active_store(&self, store_id: &str) -> Result<FileListing> {
        self.api.set_active_store(store_id).await?;
        self.state.set_current_store(Some(store_id.to_string())).await;
        info!(subsystem = "sync", store_id, "Active store changed");
        Ok(self.list_files(store_id).await)
    }

    /// Create a store. A blank name is ignored without contacting the server.
    ///
    /// The new store is made active on the server and locally, and is shown
    /// immediately as a pending entry until the server lists it.
    pub async fn create_store(&self, name: &str) -> Result<Option<CreatedStore>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let created = self.api.create_store(name).await?;
        info!(subsystem = "sync", store_id = %created.id, name, "Store created");
        self.api.set_active_store(&created.id).await?;

        self.state
            .push_pending(Store {
                active: true,
                file_count: Some(0),
                ..Store::new(created.id.clone(), created.name.clone())
            })
            .await;
        self.state.set_current_store(Some(created.id.clone())).await;
        self.list_files(&created.id).await;

        if let Err(e) = self.list_stores().await {
            warn!(subsystem = "sync", error = %e, "Store list refresh after create failed");
        }

        Ok(Some(created))
    }

    /// Delete a store after the user confirms. Returns `false` if declined.
    pub async fn delete_store(&self, store_id: &str, prompt: &dyn Prompt) -> Result<bool> {
        let label = self
            .state
            .stores()
            .await
            .into_iter()
            .find(|s| s.id == store_id)
            .map(|s| s.name)
            .unwrap_or_else(|| store_id.to_string());

        let question = format!(
            "Are you sure you want to delete the knowledge base \"{}\"? This cannot be undone.",
            label
        );
        if !prompt.confirm(&question) {
            return Ok(false);
        }

        self.api.delete_store(store_id).await?;
        info!(subsystem = "sync", store_id, "Store deleted");

        self.state.forget_store(store_id).await;
        self.state.set_current_store(None).await;
        self.list_stores().await?;
        Ok(true)
    }

    /// Create and activate the default store when none is active.
    pub async fn ensure_active_store(&self, default_name: &str) -> Result<String> {
        if let Some(id) = self.state.current_store_id().await {
            return Ok(id);
        }

        let no_store = || Error::NoActiveStore("Please create a Knowledge Base first.".to_string());

        match self.list_stores().await {
            Ok(_) => {}
            Err(e) => warn!(subsystem = "sync", error = %e, "Could not list stores"),
        }
        if let Some(id) = self.state.current_store_id().await {
            return Ok(id);
        }

        info!(subsystem = "sync", name = default_name, "Creating default store");
        match self.create_store(default_name).await {
            Ok(Some(created)) => Ok(created.id),
            Ok(None) => Err(no_store()),
            Err(e) => {
                warn!(subsystem = "sync", error = %e, "Default store creation failed");
                Err(no_store())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    /// Reload the files of `store_id` and publish them as one snapshot.
    ///
    /// Never fails: an error becomes [`FileListing::Error`].
    pub async fn list_files(&self, store_id: &str) -> FileListing {
        let listing = match self.api.list_files(store_id).await {
            Ok(mut records) => {
                records.sort_by(|a: &FileRecord, b: &FileRecord| a.name.cmp(&b.name));
                if records.is_empty() {
                    FileListing::Empty
                } else {
                    FileListing::Loaded(Arc::new(records))
                }
            }
            Err(e) => {
                warn!(subsystem = "sync", store_id, error = %e, "File listing failed");
                FileListing::Error(e.to_string())
            }
        };

        if !self.state.replace_files(store_id, listing.clone()).await {
            debug!(subsystem = "sync", store_id, "Discarded file listing for inactive store");
        }
        listing
    }

    // -------------------------------------------------------------------------
    // Models
    // -------------------------------------------------------------------------

    /// Show the preferred model list until the server answers.
    pub async fn load_placeholder_models(&self) {
        if self.state.models().await.is_empty() {
            self.state.replace_models(ModelDescriptor::preferred()).await;
        }
    }

    /// Replace the model list with the server's, if it offers any.
    pub async fn refresh_models(&self) -> Result<Arc<Vec<ModelDescriptor>>> {
        self.load_placeholder_models().await;
        let models = self.api.list_models().await?;
        debug!(subsystem = "sync", result_count = models.len(), "Models fetched");
        self.state.replace_models(models).await;
        Ok(self.state.models().await)
    }

    // -------------------------------------------------------------------------
    // Suggestions, credentials, lifecycle
    // -------------------------------------------------------------------------

    /// Starter questions for the active store, falling back to a fixed set.
    pub async fn suggestions(&self) -> Vec<String> {
        let fallback = || {
            defaults::FALLBACK_SUGGESTIONS
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        };

        let Some(store_id) = self.state.current_store_id().await else {
            return fallback();
        };

        match self.api.suggestions(&store_id).await {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => fallback(),
            Err(e) => {
                debug!(subsystem = "sync", store_id = %store_id, error = %e, "Suggestions unavailable");
                fallback()
            }
        }
    }

    /// Store the provider key, then refresh stores and models.
    ///
    /// A blank key is ignored and returns `Ok(false)`.
    pub async fn set_api_key(&self, key: &str) -> Result<bool> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(false);
        }

        self.api.set_api_key(key).await?;
        info!(subsystem = "sync", "API key saved");

        self.list_stores().await?;
        if let Err(e) = self.refresh_models().await {
            warn!(subsystem = "sync", error = %e, "Model refresh after key change failed");
        }
        Ok(true)
    }

    pub async fn has_api_key(&self) -> Result<bool> {
        self.api.has_api_key().await
    }

    /// Ask the server to stop after the user confirms.
    ///
    /// The server may exit before answering, so failures are only logged.
    pub async fn shutdown_server(&self, prompt: &dyn Prompt) -> bool {
        if !prompt.confirm("Are you sure you want to stop the server?") {
            return false;
        }
        if let Err(e) = self.api.shutdown().await {
            debug!(subsystem = "sync", error = %e, "Shutdown request did not complete");
        }
        true
    }
}
