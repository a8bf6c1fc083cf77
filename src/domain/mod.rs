//! Domain models for the User API

pub mod user;

pub use user::*;
