//! Recursive folder walking with ignore rules.
//!
//! The walker works against the [`EntryHandle`] / [`EntryBatches`] traits so
//! it can run over the local filesystem ([`FsEntry`]) or any other
//! hierarchical source that enumerates children in chunks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, warn};

use docchat_core::{defaults, IgnoreRules, Result};

/// A file or directory in a tree being walked.
#[async_trait]
pub trait EntryHandle: Send + Sync + Sized + 'static {
    type Batches: EntryBatches<Entry = Self>;

    fn name(&self) -> &str;

    fn is_directory(&self) -> bool;

    /// Start enumerating a directory's children.
    async fn open_dir(&self) -> Result<Self::Batches>;
}

/// Chunked enumeration of a directory's children.
#[async_trait]
pub trait EntryBatches: Send {
    type Entry: Send;

    /// Next chunk of children; an empty chunk means the listing is complete.
    async fn next_batch(&mut self) -> Result<Vec<Self::Entry>>;
}

/// Counters for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub files: usize,
    pub ignored_files: usize,
    pub ignored_dirs: usize,
    pub errors: usize,
}

#[derive(Default)]
struct Counters {
    files: AtomicUsize,
    ignored_files: AtomicUsize,
    ignored_dirs: AtomicUsize,
    errors: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> WalkStats {
        WalkStats {
            files: self.files.load(Ordering::Relaxed),
            ignored_files: self.ignored_files.load(Ordering::Relaxed),
            ignored_dirs: self.ignored_dirs.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Depth-first walker; sibling subtrees are walked concurrently.
#[derive(Debug, Clone, Default)]
pub struct TreeWalker {
    rules: IgnoreRules,
}

impl TreeWalker {
    pub fn new(rules: IgnoreRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &IgnoreRules {
        &self.rules
    }

    /// Emit every non-ignored file under `root` exactly once.
    ///
    /// Ignored directories are not descended into. A directory that cannot be
    /// read is logged and skipped.
    pub async fn walk<H, F>(&self, root: H, emit: F) -> WalkStats
    where
        H: EntryHandle,
        F: Fn(H) + Send + Sync,
    {
        let counters = Counters::default();
        self.visit(root, &emit, &counters).await;
        let stats = counters.snapshot();
        debug!(
            subsystem = "walker",
            files = stats.files,
            ignored_files = stats.ignored_files,
            ignored_dirs = stats.ignored_dirs,
            errors = stats.errors,
            "Walk complete"
        );
        stats
    }

    fn visit<'a, H, F>(&'a self, entry: H, emit: &'a F, counters: &'a Counters) -> BoxFuture<'a, ()>
    where
        H: EntryHandle,
        F: Fn(H) + Send + Sync,
    {
        async move {
            let is_directory = entry.is_directory();
            if self.rules.is_ignored(entry.name(), is_directory) {
                let counter = if is_directory {
                    &counters.ignored_dirs
                } else {
                    &counters.ignored_files
                };
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }

            if !is_directory {
                counters.files.fetch_add(1, Ordering::Relaxed);
                emit(entry);
                return;
            }

            let children = match read_all(&entry).await {
                Ok(children) => children,
                Err(e) => {
                    warn!(subsystem = "walker", dir = entry.name(), error = %e, "Skipping unreadable directory");
                    counters.errors.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            };

            join_all(
                children
                    .into_iter()
                    .map(|child| self.visit(child, emit, counters)),
            )
            .await;
        }
        .boxed()
    }
}

/// Drain a directory's batches until an empty one arrives.
async fn read_all<H: EntryHandle>(entry: &H) -> Result<Vec<H>> {
    let mut batches = entry.open_dir().await?;
    let mut children = Vec::new();
    loop {
        let batch = batches.next_batch().await?;
        if batch.is_empty() {
            break;
        }
        children.extend(batch);
    }
    Ok(children)
}

// =============================================================================
// FILESYSTEM
// =============================================================================

/// A file or directory on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    path: PathBuf,
    name: String,
    is_dir: bool,
}

impl FsEntry {
    /// Stat `path` and wrap it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self {
            path,
            name,
            is_dir: metadata.is_dir(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

#[async_trait]
impl EntryHandle for FsEntry {
    type Batches = FsBatches;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_directory(&self) -> bool {
        self.is_dir
    }

    async fn open_dir(&self) -> Result<FsBatches> {
        let reader = tokio::fs::read_dir(&self.path).await?;
        Ok(FsBatches {
            reader,
            batch_size: defaults::WALK_BATCH_SIZE,
        })
    }
}

/// Reads directory entries `batch_size` at a time.
pub struct FsBatches {
    reader: tokio::fs::ReadDir,
    batch_size: usize,
}

#[async_trait]
impl EntryBatches for FsBatches {
    type Entry = FsEntry;

    async fn next_batch(&mut self) -> Result<Vec<FsEntry>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            let Some(entry) = self.reader.next_entry().await? else {
                break;
            };
            let path = entry.path();
            let file_type = entry.file_type().await?;

            // Symlinked directories are not followed.
            let is_dir = if file_type.is_symlink() {
                match tokio::fs::metadata(&path).await {
                    Ok(m) if m.is_dir() => {
                        debug!(subsystem = "walker", path = %path.display(), "Skipping symlinked directory");
                        continue;
                    }
                    Ok(_) => false,
                    Err(_) => continue,
                }
            } else {
                file_type.is_dir()
            };

            batch.push(FsEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                is_dir,
            });
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory tree whose directories hand out one child per batch.
    #[derive(Debug, Clone)]
    enum Node {
        File(&'static str),
        Dir(&'static str, Vec<Node>),
        Broken(&'static str),
    }

    struct NodeBatches {
        remaining: Vec<Node>,
    }

    #[async_trait]
    impl EntryHandle for Node {
        type Batches = NodeBatches;

        fn name(&self) -> &str {
            match self {
                Node::File(n) | Node::Dir(n, _) | Node::Broken(n) => n,
            }
        }

        fn is_directory(&self) -> bool {
            !matches!(self, Node::File(_))
        }

        async fn open_dir(&self) -> Result<NodeBatches> {
            match self {
                Node::Dir(_, children) => Ok(NodeBatches {
                    remaining: children.iter().rev().cloned().collect(),
                }),
                _ => Err(docchat_core::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "denied",
                ))),
            }
        }
    }

    #[async_trait]
    impl EntryBatches for NodeBatches {
        type Entry = Node;

        async fn next_batch(&mut self) -> Result<Vec<Node>> {
            Ok(self.remaining.pop().into_iter().collect())
        }
    }

    async fn collect(root: Node) -> (Vec<String>, WalkStats) {
        let seen = Mutex::new(Vec::new());
        let stats = TreeWalker::default()
            .walk(root, |n: Node| seen.lock().unwrap().push(n.name().to_string()))
            .await;
        let mut names = seen.into_inner().unwrap();
        names.sort();
        (names, stats)
    }

    #[tokio::test]
    async fn test_prunes_ignored_directories() {
        let root = Node::Dir(
            "project",
            vec![
                Node::Dir("node_modules", vec![Node::File("x.js")]),
                Node::File(".DS_Store"),
                Node::Dir("docs", vec![Node::File("a.md")]),
            ],
        );
        let (names, stats) = collect(root).await;
        assert_eq!(names, vec!["a.md"]);
        assert_eq!(stats.ignored_dirs, 1);
        assert_eq!(stats.ignored_files, 1);
    }

    #[tokio::test]
    async fn test_reads_every_batch() {
        let root = Node::Dir(
            "root",
            vec![
                Node::File("1.txt"),
                Node::File("2.txt"),
                Node::File("3.txt"),
            ],
        );
        let (names, stats) = collect(root).await;
        assert_eq!(names.len(), 3);
        assert_eq!(stats.files, 3);
    }

    #[tokio::test]
    async fn test_unreadable_directory_is_skipped() {
        let root = Node::Dir(
            "root",
            vec![Node::Broken("locked"), Node::File("ok.txt")],
        );
        let (names, stats) = collect(root).await;
        assert_eq!(names, vec!["ok.txt"]);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn test_single_file_root() {
        let (names, _) = collect(Node::File("only.pdf")).await;
        assert_eq!(names, vec!["only.pdf"]);
    }

    #[tokio::test]
    async fn test_filesystem_walk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("docs/deep")).unwrap();
        std::fs::create_dir_all(root.join(".git/objects")).unwrap();
        std::fs::write(root.join("docs/a.md"), "a").unwrap();
        std::fs::write(root.join("docs/deep/b.md"), "b").unwrap();
        std::fs::write(root.join(".git/objects/c"), "c").unwrap();
        std::fs::write(root.join("Thumbs.db"), "").unwrap();

        let seen = Mutex::new(Vec::new());
        let entry = FsEntry::open(root).await.unwrap();
        let stats = TreeWalker::default()
            .walk(entry, |e: FsEntry| seen.lock().unwrap().push(e.name().to_string()))
            .await;

        let mut names = seen.into_inner().unwrap();
        names.sort();
        assert_eq!(names, vec!["a.md", "b.md"]);
        assert_eq!(stats.ignored_dirs, 1);
        assert_eq!(stats.ignored_files, 1);
    }
}
