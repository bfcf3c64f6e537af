//! Bounded concurrent uploads.
//!
//! The orchestrator turns a selection of files into [`UploadTask`]s, makes
//! sure a store is active, then drains a shared queue with a fixed number of
//! workers. Each task reports progress and its final state through
//! [`UploadEvent`]s; one failed file never affects the others.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use docchat_core::{defaults, percent, IgnoreRules, Message, ProgressCallback, Result, UploadTask};
use docchat_session::{Conversation, StateSync};

use crate::source::FileSource;
use crate::walker::{FsEntry, TreeWalker, WalkStats};

/// Configuration for the upload pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Maximum number of files in flight at once.
    pub max_concurrent_uploads: usize,
    /// Store created when a batch starts with no active store.
    pub default_store_name: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: defaults::UPLOAD_MAX_CONCURRENT,
            default_store_name: defaults::DEFAULT_STORE_NAME.to_string(),
        }
    }
}

impl UploadConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DOCCHAT_UPLOAD_CONCURRENCY` | `4` | Max concurrent uploads |
    pub fn from_env() -> Self {
        let max_concurrent_uploads = std::env::var("DOCCHAT_UPLOAD_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::UPLOAD_MAX_CONCURRENT)
            .max(1);

        Self {
            max_concurrent_uploads,
            ..Self::default()
        }
    }

    /// Set maximum concurrent uploads.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_uploads = max.max(1);
        self
    }
}

/// Event emitted while a batch uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// A task was created for a file.
    Queued {
        task_id: Uuid,
        name: String,
        size: u64,
    },
    /// A worker picked the task up.
    Started { task_id: Uuid, name: String },
    /// Bytes handed to the transport so far.
    Progress {
        task_id: Uuid,
        bytes_sent: u64,
        total_bytes: u64,
        percent: u8,
    },
    /// The server accepted the file.
    Completed { task_id: Uuid, name: String },
    /// The upload failed.
    Failed {
        task_id: Uuid,
        name: String,
        error: String,
    },
    /// Every task in the batch has finished.
    BatchFinished { succeeded: usize, failed: usize },
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Final state of every task, in selection order.
    pub tasks: Vec<UploadTask>,
    pub succeeded: usize,
    pub failed: usize,
    /// Files dropped by the ignore rules before any task was created.
    pub ignored: usize,
    /// Starter questions for the store, when at least one file landed.
    pub suggestions: Vec<String>,
    /// Greeting added to an empty transcript, if any.
    pub welcome: Option<Message>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

struct QueuedUpload {
    index: usize,
    task_id: Uuid,
    source: FileSource,
}

/// What a worker hands back for one task.
struct UploadOutcome {
    result: std::result::Result<(), String>,
    /// Last `(bytes_sent, total_bytes)` reported by the transport.
    progress: Option<(u64, u64)>,
}

/// Uploads files into the active store through a bounded worker pool.
pub struct UploadOrchestrator {
    sync: StateSync,
    walker: TreeWalker,
    config: UploadConfig,
    conversation: Option<Arc<Conversation>>,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl UploadOrchestrator {
    pub fn new(sync: StateSync, rules: IgnoreRules, config: UploadConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            sync,
            walker: TreeWalker::new(rules),
            config,
            conversation: None,
            event_tx,
        }
    }

    /// Post a welcome message to this conversation after each batch.
    pub fn with_conversation(mut self, conversation: Arc<Conversation>) -> Self {
        self.conversation = Some(conversation);
        self
    }

    /// Subscribe to upload events.
    pub fn events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Walk `root` and upload every non-ignored file found.
    pub async fn upload_tree(&self, root: impl AsRef<Path>) -> Result<BatchReport> {
        let (sources, stats) = self.collect_tree(root.as_ref()).await?;
        let mut report = self.upload_files(sources).await?;
        report.ignored += stats.ignored_files;
        Ok(report)
    }

    /// Walk `root` and return the files that would be uploaded.
    pub async fn collect_tree(&self, root: &Path) -> Result<(Vec<FileSource>, WalkStats)> {
        let entry = FsEntry::open(root).await?;
        let found = std::sync::Mutex::new(Vec::new());
        let stats = self
            .walker
            .walk(entry, |e: FsEntry| {
                if let Ok(mut found) = found.lock() {
                    found.push(FileSource::from_path(e.into_path()));
                }
            })
            .await;
        let sources = found
            .into_inner()
            .map_err(|_| docchat_core::Error::Internal("walk result lock poisoned".to_string()))?;
        Ok((sources, stats))
    }

    /// Upload a selection of files.
    ///
    /// Ignored names are dropped silently. If no store is active one is
    /// created first; if that fails the whole batch is rejected with
    /// `Error::NoActiveStore` and nothing is uploaded.
    pub async fn upload_files(&self, sources: Vec<FileSource>) -> Result<BatchReport> {
        let rules = self.walker.rules();
        let before = sources.len();
        let sources: Vec<FileSource> = sources
            .into_iter()
            .filter(|s| !rules.is_ignored(s.name(), false))
            .collect();
        let ignored = before - sources.len();

        if sources.is_empty() {
            debug!(subsystem = "upload", ignored, "Nothing to upload");
            return Ok(BatchReport {
                ignored,
                ..BatchReport::default()
            });
        }

        let store_id = self
            .sync
            .ensure_active_store(&self.config.default_store_name)
            .await?;

        let start = Instant::now();
        let mut tasks = Vec::with_capacity(sources.len());
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for (index, source) in sources.into_iter().enumerate() {
            let task = UploadTask::new(source.name(), source.size().await);
            let _ = self.event_tx.send(UploadEvent::Queued {
                task_id: task.id,
                name: task.name.clone(),
                size: task.size,
            });
            let _ = queue_tx.send(QueuedUpload {
                index,
                task_id: task.id,
                source,
            });
            tasks.push(task);
        }
        drop(queue_tx);

        let workers = self.config.max_concurrent_uploads.min(tasks.len()).max(1);
        info!(
            subsystem = "upload",
            store_id = %store_id,
            result_count = tasks.len(),
            workers,
            "Upload batch started"
        );

        let queue = Arc::new(Mutex::new(queue_rx));
        let mut join_set = JoinSet::new();
        for _ in 0..workers {
            let queue = queue.clone();
            let api = self.sync.api().clone();
            let event_tx = self.event_tx.clone();
            join_set.spawn(async move {
                let mut finished = Vec::new();
                loop {
                    let next = queue.lock().await.recv().await;
                    let Some(item) = next else { break };
                    let outcome = upload_one(api.as_ref(), &event_tx, item.task_id, item.source).await;
                    finished.push((item.index, outcome));
                }
                finished
            });
        }

        let mut succeeded = 0;
        let mut failed = 0;
        while let Some(joined) = join_set.join_next().await {
            let finished = match joined {
                Ok(finished) => finished,
                Err(e) => {
                    error!(subsystem = "upload", error = %e, "Upload worker panicked");
                    continue;
                }
            };
            for (index, outcome) in finished {
                let Some(task) = tasks.get_mut(index) else { continue };
                if let Some((sent, total)) = outcome.progress {
                    task.record_progress(sent, total);
                }
                match outcome.result {
                    Ok(()) => {
                        task.mark_done();
                        succeeded += 1;
                    }
                    Err(reason) => {
                        task.mark_error(reason);
                        failed += 1;
                    }
                }
            }
        }

        // A panicked worker leaves its tasks unfinished; count them as failed.
        for task in tasks.iter_mut().filter(|t| !t.is_finished()) {
            task.mark_error("upload worker stopped unexpectedly");
            failed += 1;
        }

        if succeeded > 0 {
            self.sync.list_files(&store_id).await;
            if let Err(e) = self.sync.list_stores().await {
                warn!(subsystem = "upload", error = %e, "Store refresh after upload failed");
            }
        }

        let _ = self
            .event_tx
            .send(UploadEvent::BatchFinished { succeeded, failed });
        info!(
            subsystem = "upload",
            succeeded,
            failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Upload batch finished"
        );

        let mut report = BatchReport {
            tasks,
            succeeded,
            failed,
            ignored,
            ..BatchReport::default()
        };
        if succeeded > 0 {
            report.suggestions = self.sync.suggestions().await;
            if let Some(conversation) = &self.conversation {
                report.welcome = conversation.welcome_after_batch(succeeded).await;
            }
        }
        Ok(report)
    }
}

/// Upload one file, publishing its lifecycle events.
async fn upload_one(
    api: &dyn docchat_core::KnowledgeApi,
    event_tx: &broadcast::Sender<UploadEvent>,
    task_id: Uuid,
    source: FileSource,
) -> UploadOutcome {
    let name = source.name().to_string();
    let last_progress = Arc::new(std::sync::Mutex::new(None::<(u64, u64)>));
    let _ = event_tx.send(UploadEvent::Started {
        task_id,
        name: name.clone(),
    });

    let fail = |reason: String, progress: Option<(u64, u64)>| {
        warn!(subsystem = "upload", file_name = %name, error = %reason, "Upload failed");
        let _ = event_tx.send(UploadEvent::Failed {
            task_id,
            name: name.clone(),
            error: reason.clone(),
        });
        UploadOutcome {
            result: Err(reason),
            progress,
        }
    };

    let upload = match source.load().await {
        Ok(upload) => upload,
        Err(e) => return fail(e.to_string(), None),
    };

    let progress_tx = event_tx.clone();
    let progress_sink = last_progress.clone();
    let progress: ProgressCallback = Arc::new(move |bytes_sent: u64, total_bytes: u64| {
        if let Ok(mut last) = progress_sink.lock() {
            *last = Some((bytes_sent, total_bytes));
        }
        let _ = progress_tx.send(UploadEvent::Progress {
            task_id,
            bytes_sent,
            total_bytes,
            percent: percent(bytes_sent, total_bytes),
        });
    });

    let outcome = api.upload_file(upload, progress).await;
    let reported = last_progress.lock().ok().and_then(|last| *last);
    match outcome {
        Ok(()) => {
            debug!(subsystem = "upload", file_name = %name, "Upload accepted");
            let _ = event_tx.send(UploadEvent::Completed {
                task_id,
                name: name.clone(),
            });
            UploadOutcome {
                result: Ok(()),
                progress: reported,
            }
        }
        Err(e) => fail(e.to_string(), reported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::mock::MockApi;
    use docchat_core::{Error, UploadStatus};
    use docchat_session::SessionState;

    fn orchestrator(api: &MockApi, max: usize) -> UploadOrchestrator {
        let sync = StateSync::new(Arc::new(api.clone()), Arc::new(SessionState::default()));
        UploadOrchestrator::new(
            sync,
            IgnoreRules::default(),
            UploadConfig::default().with_max_concurrent(max),
        )
    }

    fn bytes(name: &str) -> FileSource {
        FileSource::from_bytes(name, name.as_bytes().to_vec())
    }

    #[test]
    fn test_default_config() {
        let config = UploadConfig::default();
        assert_eq!(config.max_concurrent_uploads, 4);
        assert_eq!(config.default_store_name, "My Library");
    }

    #[tokio::test]
    async fn test_ignored_names_dropped_silently() {
        let api = MockApi::new();
        let orch = orchestrator(&api, 2);
        let report = orch
            .upload_files(vec![bytes(".DS_Store"), bytes("Thumbs.db")])
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(report.ignored, 2);
        assert!(api.get_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let api = MockApi::new()
            .with_store("s1", "Docs")
            .with_active_store("s1")
            .with_failing_upload("b.txt");
        let orch = orchestrator(&api, 2);

        let report = orch
            .upload_files(vec![
                bytes("a.txt"),
                bytes("b.txt"),
                bytes(".DS_Store"),
                bytes("c.txt"),
            ])
            .await
            .unwrap();

        assert_eq!(api.call_count("upload_file"), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.ignored, 1);
        let b = report.tasks.iter().find(|t| t.name == "b.txt").unwrap();
        assert_eq!(b.status, UploadStatus::Error);
        assert_eq!(b.error.as_deref(), Some("could not index b.txt"));
        // The mock rejects after the first 4-byte chunk of "b.txt".
        assert_eq!(b.progress_percent, 80);
        assert!(report
            .tasks
            .iter()
            .filter(|t| t.name != "b.txt")
            .all(|t| t.status == UploadStatus::Done && t.progress_percent == 100));
    }

    #[tokio::test]
    async fn test_creates_default_store_when_none_active() {
        let api = MockApi::new();
        let orch = orchestrator(&api, 4);
        let report = orch.upload_files(vec![bytes("a.txt")]).await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(api.call_inputs("create_store"), vec!["My Library"]);
        let active = api.server_active_store().unwrap();
        assert_eq!(api.server_files(&active), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_batch_aborts_without_store() {
        let api = MockApi::new().with_failing_create_store();
        let orch = orchestrator(&api, 4);
        let err = orch.upload_files(vec![bytes("a.txt")]).await.unwrap_err();

        assert!(matches!(err, Error::NoActiveStore(_)));
        assert_eq!(err.to_string(), "Please create a Knowledge Base first.");
        assert_eq!(api.call_count("upload_file"), 0);
    }

    #[tokio::test]
    async fn test_events_in_order_per_task() {
        let api = MockApi::new().with_store("s1", "Docs").with_active_store("s1");
        let orch = orchestrator(&api, 1);
        let mut events = orch.events();

        orch.upload_files(vec![bytes("12345678")]).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen.first(), Some(UploadEvent::Queued { size: 8, .. })));
        assert!(matches!(seen.get(1), Some(UploadEvent::Started { .. })));
        let percents: Vec<u8> = seen
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![50, 100]);
        assert!(matches!(
            seen.last(),
            Some(UploadEvent::BatchFinished {
                succeeded: 1,
                failed: 0
            })
        ));
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let api = MockApi::new()
            .with_store("s1", "Docs")
            .with_active_store("s1")
            .with_latency_ms(20);
        let orch = orchestrator(&api, 2);
        let mut events = orch.events();

        let names: Vec<String> = (0..6).map(|i| format!("f{}.txt", i)).collect();
        orch.upload_files(names.iter().map(|n| bytes(n)).collect())
            .await
            .unwrap();

        let mut in_flight = 0i32;
        let mut peak = 0i32;
        while let Ok(event) = events.try_recv() {
            match event {
                UploadEvent::Started { .. } => {
                    in_flight += 1;
                    peak = peak.max(in_flight);
                }
                UploadEvent::Completed { .. } | UploadEvent::Failed { .. } => in_flight -= 1,
                _ => {}
            }
        }
        assert_eq!(peak, 2);
    }

    #[tokio::test]
    async fn test_refreshes_after_success() {
        let api = MockApi::new().with_store("s1", "Docs").with_active_store("s1");
        let orch = orchestrator(&api, 2);
        api.clear_calls();

        orch.upload_files(vec![bytes("a.txt")]).await.unwrap();
        assert!(api.call_count("list_files") >= 1);
        assert!(api.call_count("list_stores") >= 1);
        assert_eq!(api.call_count("suggestions"), 1);
    }

    #[tokio::test]
    async fn test_welcome_posted_to_conversation() {
        let api = MockApi::new().with_store("s1", "Docs").with_active_store("s1");
        let state = Arc::new(SessionState::default());
        let shared: Arc<dyn docchat_core::KnowledgeApi> = Arc::new(api.clone());
        let conversation = Arc::new(Conversation::new(shared.clone(), state.clone()));
        let orch = UploadOrchestrator::new(
            StateSync::new(shared, state),
            IgnoreRules::default(),
            UploadConfig::default(),
        )
        .with_conversation(conversation.clone());

        let report = orch
            .upload_files(vec![bytes("a.txt"), bytes("b.txt")])
            .await
            .unwrap();
        assert!(report.welcome.unwrap().text.contains("processed 2 documents"));
        assert_eq!(report.suggestions.len(), 3);
        assert_eq!(conversation.messages().await.len(), 1);
    }
}
