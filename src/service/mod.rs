//! Domain layer boundary and its MySQL implementation

pub mod user;

pub use user::{UserDomain, UserService};
