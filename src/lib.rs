//! Conversational context management
//!
//! Keeps each conversation inside a token budget while preserving what
//! matters: messages are scored on arrival, older content is summarized and
//! low-value content pruned, and topic shifts fork the conversation into
//! branches that can later be merged or archived.

pub mod api;
pub mod branching;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod summarization;

pub use config::Config;
pub use context::{ContextManager, ContextServices, IncomingMessage, MessageRole};
pub use engine::ContextEngine;
pub use error::{ContextError, Result};
