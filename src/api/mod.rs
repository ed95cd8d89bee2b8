//! HTTP surface of the context engine

pub mod handlers;
pub mod router;

pub use handlers::{ApiError, ApiState};
pub use router::build_router;
