//! Domain models shared by every docchat crate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

// =============================================================================
// STORES & FILES
// =============================================================================

/// A named server-side collection of indexed documents ("knowledge base").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    /// Number of files, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_count: Option<i64>,
    /// Whether the server considers this store active.
    #[serde(default)]
    pub active: bool,
}

impl Store {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            file_count: None,
            active: false,
        }
    }

    /// Label used in store pickers, e.g. `Research (3 files)`.
    pub fn label(&self) -> String {
        match self.file_count {
            Some(count) => format!("{} ({} files)", self.name, count),
            None => self.name.clone(),
        }
    }
}

/// Result of listing stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreListing {
    pub stores: Vec<Store>,
    /// Active store according to the server.
    pub active_store_id: Option<String>,
}

/// A store that was just created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedStore {
    pub id: String,
    pub name: String,
}

/// A document belonging to exactly one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub uri: String,
    pub name: String,
}

/// Mapping from file uri to display name for the active store.
///
/// Always built from a complete file listing; never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMap(HashMap<String, String>);

impl FileMap {
    pub fn from_records(records: &[FileRecord]) -> Self {
        Self(
            records
                .iter()
                .map(|r| (r.uri.clone(), r.name.clone()))
                .collect(),
        )
    }

    /// Display name for a uri, if the file is known.
    pub fn resolve(&self, uri: &str) -> Option<&str> {
        self.0.get(uri).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// CONVERSATION
// =============================================================================

/// Reference from an assistant reply to a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    #[serde(rename = "startIndex", default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i64>,
    #[serde(rename = "endIndex", default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<i64>,
}

impl Citation {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            start_index: None,
            end_index: None,
        }
    }

    pub fn with_range(mut self, start: i64, end: i64) -> Self {
        self.start_index = Some(start);
        self.end_index = Some(end);
        self
    }

    /// `[start-end]` when a start index is present.
    pub fn range_label(&self) -> Option<String> {
        self.start_index.map(|start| {
            let end = self.end_index.map(|e| e.to_string()).unwrap_or_default();
            format!("[{}-{}]", start, end)
        })
    }

    /// Last `/`-separated segment of the uri.
    pub fn last_segment(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or(&self.uri)
    }
}

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Placeholder removed once the pending reply resolves.
    #[serde(default)]
    pub is_transient: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn build(role: Role, text: impl Into<String>, is_transient: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            citations: Vec::new(),
            is_transient,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::build(Role::User, text, false)
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::build(Role::Ai, text, false)
    }

    pub fn placeholder() -> Self {
        Self::build(Role::Ai, defaults::THINKING_PLACEHOLDER, true)
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }
}

/// One chat turn sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

/// Successful assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
}

// =============================================================================
// MODELS
// =============================================================================

/// A selectable generation model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// The static placeholder list shown before the server answers.
    pub fn preferred() -> Vec<Self> {
        defaults::PREFERRED_MODELS
            .iter()
            .map(|(id, name)| Self::new(*id, *name))
            .collect()
    }
}

// =============================================================================
// UPLOADS
// =============================================================================

/// Lifecycle of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Done,
    Error,
}

/// Ephemeral per-file upload unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub progress_percent: u8,
    pub status: UploadStatus,
    /// Human-readable reason when `status` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadTask {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            size,
            progress_percent: 0,
            status: UploadStatus::Pending,
            error: None,
        }
    }

    /// Record bytes sent and return the new percentage.
    pub fn record_progress(&mut self, bytes_sent: u64, total_bytes: u64) -> u8 {
        self.status = UploadStatus::Uploading;
        self.progress_percent = percent(bytes_sent, total_bytes);
        self.progress_percent
    }

    pub fn mark_done(&mut self) {
        self.status = UploadStatus::Done;
        self.progress_percent = 100;
        self.error = None;
    }

    pub fn mark_error(&mut self, reason: impl Into<String>) {
        self.status = UploadStatus::Error;
        self.error = Some(reason.into());
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, UploadStatus::Done | UploadStatus::Error)
    }
}

/// Integer percentage in `0..=100`; an empty body counts as complete.
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as u128 * 100) / total as u128) as u8
}
