use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Validates a bearer credential and yields the caller's stable subject
/// identifier.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, bearer_token: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// JWT-based [`IdentityVerifier`] (HS256, shared secret).
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, bearer_token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(bearer_token, &self.decoding_key, &self.validation)
            .map_err(AuthError::InvalidToken)?;
        Ok(data.claims.sub)
    }
}

/// Root prefix for caller-owned uploads.
pub const PRIVATE_ROOT: &str = "private/";

/// The private key prefix owned by a subject.
pub fn private_prefix(subject: &str) -> String {
    format!("{PRIVATE_ROOT}{subject}/")
}

/// Whether `key` falls under the subject's private prefix. The API must pass
/// this check before touching storage, independent of any storage-layer
/// policy.
pub fn key_in_scope(subject: &str, key: &str) -> bool {
    key.starts_with(&private_prefix(subject))
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Invalid bearer credential: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Credential rejected")]
    Rejected,
}
