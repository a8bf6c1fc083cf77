//! Application state traits for dependency injection
//!
//! Handlers are generic over [`HasServices`] so the same code runs against
//! the production `AppState` and test implementations.

use crate::config::Config;
use crate::context::Clock;
use crate::jwt::JwtManager;
use crate::repository::ResourcePool;
use crate::service::UserDomain;

/// Trait for application state that provides access to all services.
///
/// Everything reachable from here is set once at construction and never
/// mutated while serving requests.
pub trait HasServices: Clone + Send + Sync + 'static {
    /// The backing-store pool
    type Pool: ResourcePool;
    /// The user domain, operating on handles from `Pool`
    type Users: UserDomain<Handle = <Self::Pool as ResourcePool>::Handle>;

    /// Get the application configuration
    fn config(&self) -> &Config;

    /// Get the connection pool
    fn pool(&self) -> &Self::Pool;

    /// Get the user domain
    fn users(&self) -> &Self::Users;

    /// Get the token authenticator
    fn jwt_manager(&self) -> &JwtManager;

    /// Get the clock used to stamp each request context
    fn clock(&self) -> &dyn Clock;
}
