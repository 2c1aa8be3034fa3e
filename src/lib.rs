//! Git commit digest library
//!
//! Collects the commits that landed on every remote branch in a lookback
//! window, summarizes them with an OpenAI-compatible chat model in a
//! chunk -> commit -> daily map-reduce, and delivers the digest to a chat
//! webhook.
pub mod api;
pub mod collect;
pub mod config;
pub mod diff;
pub mod error;
pub mod git;
pub mod map_reduce;
pub mod notify;
pub mod pipeline;
pub mod style;
pub mod templates;
pub mod types;

// Re-export commonly used types
pub use config::DigestConfig;
pub use error::{DigestError, Result};
pub use pipeline::{RunOutcome, run_digest};
pub use types::{Args, Window};
