//! JWT token handling: roles, claims and the token authenticator

use crate::config::JwtConfig;
use crate::domain::Token;
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Roles a user can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity asserted for the current request.
///
/// Claims are immutable once built; the request context only ever holds
/// them behind a shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    #[serde(rename = "sub")]
    subject: String,
    /// Granted roles
    roles: Vec<Role>,
    /// Issuer
    iss: String,
    /// Issued at (Unix timestamp)
    #[serde(rename = "iat")]
    issued_at: i64,
    /// Expiration (Unix timestamp)
    #[serde(rename = "exp")]
    expires_at: i64,
}

impl Claims {
    pub fn new(
        subject: impl Into<String>,
        roles: Vec<Role>,
        issuer: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            subject: subject.into(),
            roles,
            iss: issuer.into(),
            issued_at: now.timestamp(),
            expires_at: (now + ttl).timestamp(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.issued_at, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }

    /// Whether `now` falls inside the `[iat, exp)` validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let now = now.timestamp();
        self.issued_at <= now && now < self.expires_at
    }
}

/// Issues and verifies signed tokens.
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> anyhow::Result<Self> {
        let algorithm = if config.private_key_pem.is_some() {
            Algorithm::RS256
        } else {
            Algorithm::HS256
        };
        let encoding_key = match config.private_key_pem.as_ref() {
            Some(private_key) => EncodingKey::from_rsa_pem(private_key.as_bytes())
                .map_err(|e| anyhow::anyhow!("Failed to load JWT private key: {}", e))?,
            None => EncodingKey::from_secret(config.secret.as_bytes()),
        };
        let decoding_key = match (
            config.public_key_pem.as_ref(),
            config.private_key_pem.as_ref(),
        ) {
            (Some(public_key), _) => DecodingKey::from_rsa_pem(public_key.as_bytes())
                .map_err(|e| anyhow::anyhow!("Failed to load JWT public key: {}", e))?,
            (None, Some(_)) => anyhow::bail!("JWT_PUBLIC_KEY is required with JWT_PRIVATE_KEY"),
            (None, None) => DecodingKey::from_secret(config.secret.as_bytes()),
        };
        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            algorithm,
        })
    }

    /// Build claims for `subject` valid from `now` for the configured TTL.
    pub fn claims_for(&self, subject: &str, roles: Vec<Role>, now: DateTime<Utc>) -> Claims {
        Claims::new(
            subject,
            roles,
            self.config.issuer.clone(),
            now,
            Duration::seconds(self.config.token_ttl_secs),
        )
    }

    /// Sign claims into an opaque token.
    pub fn issue(&self, claims: &Claims) -> Result<Token> {
        let header = Header::new(self.algorithm);
        let token =
            encode(&header, claims, &self.encoding_key).map_err(|e| AppError::Internal(e.into()))?;
        Ok(Token { token })
    }

    /// Verify the signature and issuer of a token and decode its claims.
    ///
    /// The validity window is not checked here: callers compare it against
    /// the request's own `now` with [`Claims::is_valid_at`].
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.set_issuer(&[&self.config.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    pub fn uses_rsa(&self) -> bool {
        self.algorithm == Algorithm::RS256
    }
}
