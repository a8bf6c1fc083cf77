//! REST API: handlers, success emission and error translation

pub mod error;
pub mod health;
pub mod metrics;
pub mod response;
pub mod user;

pub use error::{ApiError, ErrorKind, ErrorResponse};
pub use response::Emit;
