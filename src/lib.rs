//! User API Core
//!
//! Per-request handling for the user resource: request context, pooled
//! resource scope, authorization, domain delegation and error translation.

pub mod api;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod policy;
pub mod repository;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
