//! # docchat-ingest
//!
//! Getting local documents into a store.
//!
//! - [`TreeWalker`] walks a folder (or any [`EntryHandle`] tree), pruning
//!   ignored directories and skipping ignored files.
//! - [`UploadOrchestrator`] uploads a selection through a bounded worker pool,
//!   publishing per-file [`UploadEvent`]s on a broadcast channel.
//!
//! ## Example
//!
//! ```ignore
//! use docchat_ingest::{UploadConfig, UploadOrchestrator};
//!
//! let orchestrator = UploadOrchestrator::new(sync, IgnoreRules::from_env(), UploadConfig::from_env());
//! let mut events = orchestrator.events();
//! let report = orchestrator.upload_tree("./papers").await?;
//! println!("{} uploaded, {} failed", report.succeeded, report.failed);
//! ```

pub mod source;
pub mod uploader;
pub mod walker;

pub use source::FileSource;
pub use uploader::{BatchReport, UploadConfig, UploadEvent, UploadOrchestrator};
pub use walker::{EntryBatches, EntryHandle, FsEntry, TreeWalker, WalkStats};
