//! Shared session state.
//!
//! One [`SessionState`] is created per session and shared (behind an `Arc`)
//! by the upload orchestrator, the store sync and the conversation. Lists are
//! stored as `Arc` snapshots and replaced wholesale, so a reader sees either
//! the old or the new list, never a mix.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use docchat_core::{defaults, FileMap, FileRecord, Message, ModelDescriptor, Store};

/// What is currently known about the active store's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileListing {
    /// No store is active.
    NoStore,
    /// Files of the active store, ordered by name.
    Loaded(Arc<Vec<FileRecord>>),
    /// The active store has no files.
    Empty,
    /// The last refresh failed.
    Error(String),
}

impl FileListing {
    pub fn files(&self) -> &[FileRecord] {
        match self {
            FileListing::Loaded(files) => files.as_slice(),
            _ => &[],
        }
    }
}

/// A freshly created store not yet confirmed by a list refresh.
#[derive(Debug, Clone)]
struct PendingStore {
    store: Store,
    created_at: Instant,
}

#[derive(Debug)]
struct Inner {
    stores: Arc<Vec<Store>>,
    pending: Vec<PendingStore>,
    current_store_id: Option<String>,
    files: FileListing,
    file_map: Arc<FileMap>,
    models: Arc<Vec<ModelDescriptor>>,
    selected_model: Option<String>,
    transcript: Vec<Message>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            stores: Arc::new(Vec::new()),
            pending: Vec::new(),
            current_store_id: None,
            files: FileListing::NoStore,
            file_map: Arc::new(FileMap::default()),
            models: Arc::new(Vec::new()),
            selected_model: None,
            transcript: Vec::new(),
        }
    }
}

/// Single holder for everything the session knows about the server.
#[derive(Debug)]
pub struct SessionState {
    inner: RwLock<Inner>,
    pending_ttl: Duration,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Duration::from_secs(defaults::PENDING_STORE_TTL_SECS))
    }
}

impl SessionState {
    pub fn new(pending_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            pending_ttl,
        }
    }

    // -------------------------------------------------------------------------
    // Stores
    // -------------------------------------------------------------------------

    /// Authoritative stores followed by unexpired pending ones.
    pub async fn stores(&self) -> Vec<Store> {
        let inner = self.inner.read().await;
        let mut stores: Vec<Store> = inner.stores.as_ref().clone();
        for pending in &inner.pending {
            if pending.created_at.elapsed() < self.pending_ttl
                && !stores.iter().any(|s| s.id == pending.store.id)
            {
                stores.push(pending.store.clone());
            }
        }
        stores
    }

    /// Replace the authoritative store list.
    ///
    /// Pending entries whose id appears in `stores`, or that have expired,
    /// are dropped.
    pub async fn replace_stores(&self, stores: Vec<Store>) {
        let mut inner = self.inner.write().await;
        let ttl = self.pending_ttl;
        inner
            .pending
            .retain(|p| p.created_at.elapsed() < ttl && !stores.iter().any(|s| s.id == p.store.id));
        inner.stores = Arc::new(stores);
    }

    /// Add an optimistic entry for a store the server just created.
    pub async fn push_pending(&self, store: Store) {
        let mut inner = self.inner.write().await;
        inner.pending.retain(|p| p.store.id != store.id);
        inner.pending.push(PendingStore {
            store,
            created_at: Instant::now(),
        });
    }

    /// Drop a deleted store from both the authoritative list and the overlay.
    pub async fn forget_store(&self, store_id: &str) {
        let mut inner = self.inner.write().await;
        inner.pending.retain(|p| p.store.id != store_id);
        if inner.stores.iter().any(|s| s.id == store_id) {
            let kept: Vec<Store> = inner
                .stores
                .iter()
                .filter(|s| s.id != store_id)
                .cloned()
                .collect();
            inner.stores = Arc::new(kept);
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.read().await.pending.len()
    }

    pub async fn current_store_id(&self) -> Option<String> {
        self.inner.read().await.current_store_id.clone()
    }

    /// Point at a store; an actual change resets the file listing.
    pub async fn set_current_store(&self, store_id: Option<String>) {
        let mut inner = self.inner.write().await;
        if inner.current_store_id != store_id {
            inner.current_store_id = store_id;
            inner.files = FileListing::NoStore;
            inner.file_map = Arc::new(FileMap::default());
        }
    }

    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    pub async fn file_listing(&self) -> FileListing {
        self.inner.read().await.files.clone()
    }

    pub async fn file_map(&self) -> Arc<FileMap> {
        self.inner.read().await.file_map.clone()
    }

    /// Replace the listing and the File Map together.
    ///
    /// Ignored when `store_id` is no longer the active store, so a slow
    /// response for a previous store cannot overwrite the current one.
    pub async fn replace_files(&self, store_id: &str, listing: FileListing) -> bool {
        let mut inner = self.inner.write().await;
        if inner.current_store_id.as_deref() != Some(store_id) {
            return false;
        }
        inner.file_map = Arc::new(FileMap::from_records(listing.files()));
        inner.files = listing;
        true
    }

    // -------------------------------------------------------------------------
    // Models
    // -------------------------------------------------------------------------

    pub async fn models(&self) -> Arc<Vec<ModelDescriptor>> {
        self.inner.read().await.models.clone()
    }

    /// Selected model id, or the default chat model when nothing is selected.
    pub async fn selected_model(&self) -> String {
        self.inner
            .read()
            .await
            .selected_model
            .clone()
            .unwrap_or_else(|| defaults::CHAT_MODEL.to_string())
    }

    /// Select a model from the current list. Returns `false` if it is unknown.
    pub async fn select_model(&self, model_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.models.iter().any(|m| m.id == model_id) {
            inner.selected_model = Some(model_id.to_string());
            true
        } else {
            false
        }
    }

    /// Select a model id the list does not offer; the server decides if it exists.
    pub async fn set_selected_model(&self, model_id: impl Into<String>) {
        self.inner.write().await.selected_model = Some(model_id.into());
    }

    /// Replace the model list, keeping the selection if it is still offered.
    ///
    /// An empty list leaves the current one in place.
    pub async fn replace_models(&self, models: Vec<ModelDescriptor>) {
        if models.is_empty() {
            return;
        }
        let mut inner = self.inner.write().await;
        let keep = inner
            .selected_model
            .as_ref()
            .filter(|id| models.iter().any(|m| &m.id == *id))
            .cloned();
        inner.selected_model = keep.or_else(|| models.first().map(|m| m.id.clone()));
        inner.models = Arc::new(models);
    }

    // -------------------------------------------------------------------------
    // Transcript
    // -------------------------------------------------------------------------

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.read().await.transcript.clone()
    }

    pub async fn push_message(&self, message: Message) {
        self.inner.write().await.transcript.push(message);
    }

    /// Push `message` only if the transcript is empty.
    pub async fn push_if_empty(&self, message: Message) -> bool {
        let mut inner = self.inner.write().await;
        if inner.transcript.is_empty() {
            inner.transcript.push(message);
            true
        } else {
            false
        }
    }

    pub async fn remove_message(&self, id: Uuid) {
        self.inner.write().await.transcript.retain(|m| m.id != id);
    }

    pub async fn clear_transcript(&self) {
        self.inner.write().await.transcript.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(id: &str) -> Store {
        Store::new(id, format!("Store {}", id))
    }

    #[tokio::test]
    async fn test_pending_store_collapses_on_replace() {
        let state = SessionState::default();
        state.push_pending(store("s1")).await;
        assert_eq!(state.stores().await.len(), 1);

        state.replace_stores(vec![store("s1")]).await;
        assert_eq!(state.stores().await.len(), 1);
        assert_eq!(state.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_pending_store_survives_stale_listing() {
        let state = SessionState::default();
        state.push_pending(store("s2")).await;
        state.replace_stores(vec![store("s1")]).await;

        let ids: Vec<String> = state.stores().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_store_expires() {
        let state = SessionState::new(Duration::from_secs(30));
        state.push_pending(store("s2")).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(state.stores().await.is_empty());
    }

    #[tokio::test]
    async fn test_forget_store_drops_pending_and_listed() {
        let state = SessionState::default();
        state.replace_stores(vec![store("s1"), store("s2")]).await;
        state.push_pending(store("s3")).await;

        state.forget_store("s3").await;
        state.forget_store("s1").await;

        let ids: Vec<String> = state.stores().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["s2"]);
        assert_eq!(state.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_stale_file_response_is_ignored() {
        let state = SessionState::default();
        state.set_current_store(Some("s1".to_string())).await;
        state.set_current_store(Some("s2".to_string())).await;

        let records = vec![FileRecord {
            uri: "files/a".to_string(),
            name: "a.txt".to_string(),
        }];
        assert!(!state.replace_files("s1", FileListing::Loaded(Arc::new(records))).await);
        assert_eq!(state.file_listing().await, FileListing::NoStore);
    }

    #[tokio::test]
    async fn test_replace_files_updates_file_map() {
        let state = SessionState::default();
        state.set_current_store(Some("s1".to_string())).await;
        let records = vec![FileRecord {
            uri: "files/a".to_string(),
            name: "a.txt".to_string(),
        }];
        assert!(state.replace_files("s1", FileListing::Loaded(Arc::new(records))).await);
        assert_eq!(state.file_map().await.resolve("files/a"), Some("a.txt"));
    }

    #[tokio::test]
    async fn test_model_selection_preserved() {
        let state = SessionState::default();
        state
            .replace_models(vec![
                ModelDescriptor::new("m1", "One"),
                ModelDescriptor::new("m2", "Two"),
            ])
            .await;
        assert!(state.select_model("m2").await);

        state
            .replace_models(vec![
                ModelDescriptor::new("m2", "Two"),
                ModelDescriptor::new("m3", "Three"),
            ])
            .await;
        assert_eq!(state.selected_model().await, "m2");
    }

    #[tokio::test]
    async fn test_model_selection_resets_to_first() {
        let state = SessionState::default();
        state
            .replace_models(vec![ModelDescriptor::new("m1", "One")])
            .await;
        state
            .replace_models(vec![
                ModelDescriptor::new("m4", "Four"),
                ModelDescriptor::new("m5", "Five"),
            ])
            .await;
        assert_eq!(state.selected_model().await, "m4");
    }

    #[tokio::test]
    async fn test_empty_model_list_keeps_placeholder() {
        let state = SessionState::default();
        state.replace_models(ModelDescriptor::preferred()).await;
        state.replace_models(Vec::new()).await;
        assert_eq!(state.models().await.len(), defaults::PREFERRED_MODELS.len());
    }

    #[tokio::test]
    async fn test_default_model_when_unselected() {
        let state = SessionState::default();
        assert_eq!(state.selected_model().await, defaults::CHAT_MODEL);
    }
}
