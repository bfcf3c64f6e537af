//! Centralized default constants for docchat.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers and strings.

// =============================================================================
// SERVER
// =============================================================================

/// Default API base URL (the bundled server listens on port 5000).
pub const BASE_URL: &str = "http://127.0.0.1:5000";

// =============================================================================
// STORES
// =============================================================================

/// Name of the store created automatically when uploading with no active store.
pub const DEFAULT_STORE_NAME: &str = "My Library";

/// Seconds an optimistic store entry survives without an authoritative match.
pub const PENDING_STORE_TTL_SECS: u64 = 30;

// =============================================================================
// UPLOADS
// =============================================================================

/// Fixed size of the upload worker pool.
pub const UPLOAD_MAX_CONCURRENT: usize = 4;

/// Body chunk size used to report upload progress.
pub const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Children requested per directory read by the filesystem walker.
pub const WALK_BATCH_SIZE: usize = 100;

/// Capacity of upload event broadcast channels.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// HEARTBEAT
// =============================================================================

/// Keep-alive interval in milliseconds.
pub const HEARTBEAT_INTERVAL_MS: u64 = 2000;

// =============================================================================
// CHAT
// =============================================================================

/// Model used for chat when nothing is selected.
pub const CHAT_MODEL: &str = "gemini-1.5-flash";

/// Text of the transient placeholder shown while a reply is pending.
pub const THINKING_PLACEHOLDER: &str = "Thinking...";

/// Message shown when the transport fails during chat.
pub const NETWORK_ERROR_MESSAGE: &str = "Network Error";

/// Message seeded after the transcript is cleared.
pub const CHAT_CLEARED_MESSAGE: &str = "Chat cleared. Upload more files or ask a question.";

/// Display name for citations whose uri has no usable name.
pub const UNKNOWN_FILE: &str = "Unknown File";

/// Prompt suggestions used when the server returns none.
pub const FALLBACK_SUGGESTIONS: &[&str] = &[
    "Summarize the documents",
    "What are the key points?",
    "Any risks mentioned?",
];

/// Preferred models shown before the authoritative list arrives: (id, display name).
pub const PREFERRED_MODELS: &[(&str, &str)] = &[
    ("gemini-3.0-pro-preview", "Gemini 3.0 Pro Preview"),
    ("gemini-2.5-pro", "Gemini 2.5 Pro"),
    ("gemini-2.5-flash", "Gemini 2.5 Flash"),
    ("gemini-2.5-flash-lite", "Gemini 2.5 Flash-Lite"),
    ("gemini-2.0-flash-exp", "Gemini 2.0 Flash Exp"),
    ("gemini-1.5-pro", "Gemini 1.5 Pro"),
    ("gemini-1.5-flash", "Gemini 1.5 Flash"),
];

// =============================================================================
// IGNORE RULES
// =============================================================================

/// Directory names never walked or uploaded.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".env",
    "dist",
    "build",
    ".idea",
    ".vscode",
];

/// File names never uploaded.
pub const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];
