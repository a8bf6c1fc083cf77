//! API integration tests infrastructure
//!
//! This module provides test utilities for API handler testing without
//! external dependencies (no database, no network).

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use userapi_core::config::JwtConfig;
use userapi_core::domain::{NewUser, Token, UpdateUser, User};
use userapi_core::error::{AppError, Result};
use userapi_core::jwt::{JwtManager, Role};
use userapi_core::repository::{AcquireError, ResourcePool};
use userapi_core::service::UserDomain;
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// Test Configuration
// ============================================================================

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret-key-for-api-testing-purposes".to_string(),
        issuer: "https://userapi.test".to_string(),
        token_ttl_secs: 3600,
        private_key_pem: None,
        public_key_pem: None,
    }
}

pub fn create_test_jwt_manager() -> JwtManager {
    JwtManager::new(test_jwt_config()).unwrap()
}

/// The instant every test request is stamped with.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
}

pub fn create_test_user(id: &str, roles: Vec<Role>) -> User {
    User {
        id: id.to_string(),
        name: format!("User {}", id),
        email: format!("{}@example.com", id),
        roles,
        date_created: test_now(),
        date_modified: test_now(),
    }
}

// ============================================================================
// Counting Resource Pool
// ============================================================================

/// Handle that reports its own release.
#[derive(Debug)]
pub struct TestHandle {
    released: Arc<AtomicUsize>,
}

impl Drop for TestHandle {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pool counting every acquisition and release.
pub struct TestResourcePool {
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
    exhausted: AtomicBool,
}

impl TestResourcePool {
    pub fn new() -> Self {
        Self {
            acquired: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Make every following acquisition fail.
    pub fn exhaust(&self) {
        self.exhausted.store(true, Ordering::SeqCst);
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for TestResourcePool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourcePool for TestResourcePool {
    type Handle = TestHandle;

    async fn acquire(&self) -> std::result::Result<TestHandle, AcquireError> {
        if self.exhausted.load(Ordering::SeqCst) {
            return Err(AcquireError::Exhausted);
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(TestHandle {
            released: self.released.clone(),
        })
    }
}

// ============================================================================
// In-memory User Domain
// ============================================================================

struct StoredUser {
    user: User,
    password: String,
}

/// In-memory user domain that counts how often it is reached.
///
/// A stalled domain parks every call after recording it, so tests can
/// cancel a request while its handle is held.
pub struct TestUserDomain {
    users: RwLock<Vec<StoredUser>>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    stalled: AtomicBool,
    entered: Notify,
}

impl TestUserDomain {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(vec![]),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            stalled: AtomicBool::new(false),
            entered: Notify::new(),
        }
    }

    /// Park every following call forever.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Resolves once a stalled call has been entered.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Number of domain operations that ran to completion.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub async fn add_user(&self, user: User, password: &str) {
        self.users.write().await.push(StoredUser {
            user,
            password: password.to_string(),
        });
    }

    pub async fn find(&self, id: &str) -> Option<User> {
        let users = self.users.read().await;
        users.iter().find(|s| s.user.id == id).map(|s| s.user.clone())
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Number of domain operations invoked so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            self.entered.notify_one();
            std::future::pending::<()>().await;
        }
    }

    fn complete<T>(&self, result: Result<T>) -> Result<T> {
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

impl Default for TestUserDomain {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

#[async_trait]
impl UserDomain for TestUserDomain {
    type Handle = TestHandle;

    async fn list(&self, _handle: &mut TestHandle) -> Result<Vec<User>> {
        self.record_call().await;
        let users = self.users.read().await;
        self.complete(Ok(users.iter().map(|s| s.user.clone()).collect()))
    }

    async fn retrieve(&self, _handle: &mut TestHandle, id: &str) -> Result<User> {
        self.record_call().await;
        let found = self.find(id).await.ok_or_else(|| not_found(id));
        self.complete(found)
    }

    async fn create(
        &self,
        _handle: &mut TestHandle,
        input: &NewUser,
        now: DateTime<Utc>,
    ) -> Result<User> {
        self.record_call().await;
        input.validate()?;

        let mut users = self.users.write().await;
        if users.iter().any(|s| s.user.email == input.email) {
            return Err(AppError::Conflict(format!(
                "User with email '{}' already exists",
                input.email
            )));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: input.name.clone(),
            email: input.email.clone(),
            roles: input.roles.clone(),
            date_created: now,
            date_modified: now,
        };
        users.push(StoredUser {
            user: user.clone(),
            password: input.password.clone(),
        });
        self.complete(Ok(user))
    }

    async fn update(
        &self,
        _handle: &mut TestHandle,
        id: &str,
        input: &UpdateUser,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.record_call().await;
        input.validate()?;

        let mut users = self.users.write().await;
        let stored = users
            .iter_mut()
            .find(|s| s.user.id == id)
            .ok_or_else(|| not_found(id))?;

        if let Some(name) = &input.name {
            stored.user.name = name.clone();
        }
        if let Some(email) = &input.email {
            stored.user.email = email.clone();
        }
        if let Some(roles) = &input.roles {
            stored.user.roles = roles.clone();
        }
        if let Some(password) = &input.password {
            stored.password = password.clone();
        }
        stored.user.date_modified = now;
        self.complete(Ok(()))
    }

    async fn delete(&self, _handle: &mut TestHandle, id: &str) -> Result<()> {
        self.record_call().await;
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|s| s.user.id != id);
        if users.len() == before {
            return self.complete(Err(not_found(id)));
        }
        self.complete(Ok(()))
    }

    async fn authenticate(
        &self,
        _handle: &mut TestHandle,
        authenticator: &JwtManager,
        now: DateTime<Utc>,
        email: &str,
        password: &str,
    ) -> Result<Token> {
        self.record_call().await;
        let users = self.users.read().await;
        let stored = users
            .iter()
            .find(|s| s.user.email == email && s.password == password)
            .ok_or(AppError::InvalidCredentials)?;

        let claims = authenticator.claims_for(&stored.user.id, stored.user.roles.clone(), now);
        self.complete(authenticator.issue(&claims))
    }
}
