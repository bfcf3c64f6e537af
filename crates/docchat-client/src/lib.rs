//! # docchat-client
//!
//! HTTP client for the document-chat server.
//!
//! [`HttpApi`] implements [`docchat_core::KnowledgeApi`] over the server's
//! `/api` JSON surface. Uploads are sent as multipart bodies streamed in
//! chunks so callers see byte-level progress.
//!
//! # Configuration
//!
//! See [`ClientConfig::from_env`] for the environment variables read.

pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use config::ClientConfig;
pub use error::{to_docchat_error, ApiErrorCode};
pub use http::{encode_store_id, HttpApi};
