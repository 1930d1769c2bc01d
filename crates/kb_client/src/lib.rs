//! Typed client for the knowledge-base backend.
//!
//! Every call goes through [`ApiClient`], which attaches the session token,
//! hands the request to a [`kb_core::Transport`] (network or fixtures) and
//! turns the answer into either a `{code, message, data}` value or a
//! classified [`kb_core::Error`].

pub mod api;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod session;

pub use client::{classify, ApiClient, UnauthorizedHook};
pub use config::{default_session_path, ClientConfig};
pub use dashboard::{Dashboard, DashboardSnapshot};
pub use session::{FileStore, KeyValueStore, MemoryStore, Session};

pub use kb_core::{ApiEnvelope, Error, Result};
