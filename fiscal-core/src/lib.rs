//! fiscal-core: Shared infrastructure for the fiscal engine.
pub mod config;
pub mod crypto;
pub mod error;
pub mod middleware;
pub mod observability;

pub use anyhow;
pub use axum;
pub use secrecy;
pub use serde;
pub use serde_json;
pub use tracing;
pub use validator;
