//! Bearer token authentication with JWT.
//!
//! Tokens carry the caller's user id (`sub`) and role. Members may read the
//! graph and edit what they own; admins may do everything.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use roots_domain::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Session management error
#[derive(Debug, Error)]
pub enum SessionError {
    /// JWT encoding failed
    #[error("Failed to encode JWT: {0}")]
    JwtEncode(#[from] jsonwebtoken::errors::Error),

    /// Token expired
    #[error("Session token expired")]
    TokenExpired,

    /// Invalid token
    #[error("Invalid session token")]
    InvalidToken,

    /// No bearer token on the request
    #[error("Missing bearer token")]
    MissingToken,
}

/// What a caller is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full write access
    Admin,
    /// Read access plus edits to owned records
    Member,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Member => "member",
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            _ => Err(format!("Unknown role: {} (expected admin or member)", s)),
        }
    }
}

/// JWT claims for session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User identifier
    pub sub: String,

    /// Caller role
    pub role: Role,

    /// Token expiration timestamp (Unix epoch seconds)
    pub exp: u64,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,
}

impl SessionClaims {
    /// Whether the caller holds the admin role
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Session manager handles JWT token generation and validation
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry_secs: u64,
}

impl SessionManager {
    /// Create a new session manager with the given JWT secret and expiry
    pub fn new(jwt_secret: &str, token_expiry_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_expiry_secs,
        }
    }

    /// Generate a new session token for the given user and role
    pub fn generate_token(&self, user_id: &str, role: Role) -> Result<String, SessionError> {
        let now = now_millis() / 1000;

        let claims = SessionClaims {
            sub: user_id.to_string(),
            role,
            exp: now + self.token_expiry_secs,
            iat: now,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a session token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let validation = Validation::default();
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::TokenExpired,
                _ => SessionError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }

    /// Validate the value of an `Authorization` header (`Bearer <jwt>`)
    pub fn validate_bearer(&self, header: Option<&str>) -> Result<SessionClaims, SessionError> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::MissingToken)?;
        self.validate_token(token)
    }
}
