//! # docchat-core
//!
//! Core types, traits, and abstractions for the docchat client.
//!
//! This crate provides the foundational data structures (stores, files,
//! messages, citations, upload tasks), the `KnowledgeApi` seam that the HTTP
//! client implements, ignore rules, shared defaults and the error type that
//! other docchat crates depend on.
//!
//! ## Logging
//!
//! Every crate logs through `tracing` with a `subsystem` field (`client`,
//! `sync`, `conversation`, `heartbeat`, `walker`, `upload`) plus entity and
//! measurement fields such as `store_id`, `file_name`, `duration_ms` and
//! `result_count`.
//!
//! | Level | Usage |
//! |-------|-------|
//! | WARN  | Recoverable issue (one upload failed, unreadable directory) |
//! | INFO  | Lifecycle events, store mutations, batch completions |
//! | DEBUG | Refreshes, request summaries, swallowed heartbeat errors |

pub mod defaults;
pub mod error;
pub mod ignore;
pub mod models;
pub mod traits;

// In-memory API for tests (here and in downstream crates)
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use ignore::IgnoreRules;
pub use models::*;
pub use traits::*;
