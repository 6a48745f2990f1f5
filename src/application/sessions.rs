use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{RepoError, SessionsRepo};
use crate::domain::sessions::SessionRecord;

const TOKEN_PREFIX: &str = "hs";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("`{0}` is not a valid email address")]
    InvalidEmail(String),
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing session token")]
    Missing,
    #[error("invalid session token")]
    Invalid,
    #[error("expired session token")]
    Expired,
    #[error("revoked session token")]
    Revoked,
}

#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub record: SessionRecord,
    pub token: String,
}

/// Authenticated caller; the email was verified by the identity provider
/// before the session was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPrincipal {
    pub session_id: Uuid,
    pub email: String,
}

#[derive(Clone)]
pub struct SessionService {
    repo: Arc<dyn SessionsRepo>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(repo: Arc<dyn SessionsRepo>, ttl: Duration) -> Self {
        Self { repo, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn issue(&self, email: &str) -> Result<SessionIssued, SessionError> {
        let email = normalize_email(email)?;
        let prefix = Self::generate_prefix();
        let secret = Self::generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let now = OffsetDateTime::now_utc();

        let record = SessionRecord {
            id: Uuid::new_v4(),
            email,
            prefix,
            hashed_secret: Self::hash_secret(&secret),
            expires_at: now + self.ttl,
            revoked_at: None,
            created_at: now,
        };
        self.repo.create_session(&record).await?;

        Ok(SessionIssued { record, token })
    }

    pub async fn authenticate(&self, token: &str) -> Result<SessionPrincipal, AuthError> {
        let parsed = Self::parse_token(token).ok_or(AuthError::Invalid)?;
        let record = self
            .repo
            .find_session_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| AuthError::Invalid)?
            .ok_or(AuthError::Invalid)?;

        let hashed_input = Self::hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Invalid);
        }

        let now = OffsetDateTime::now_utc();
        if record.is_revoked_at(now) {
            return Err(AuthError::Revoked);
        }
        if record.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        Ok(SessionPrincipal {
            session_id: record.id,
            email: record.email,
        })
    }

    pub async fn revoke(&self, id: Uuid) -> Result<(), SessionError> {
        self.repo
            .revoke_session(id, OffsetDateTime::now_utc())
            .await?;
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        let removed = self
            .repo
            .purge_expired_sessions(OffsetDateTime::now_utc())
            .await?;
        Ok(removed)
    }

    fn hash_secret(secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }

    fn generate_prefix() -> String {
        Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    fn generate_secret() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    fn parse_token(token: &str) -> Option<ParsedToken> {
        let mut parts = token.trim().splitn(3, '_');
        if parts.next()? != TOKEN_PREFIX {
            return None;
        }
        let prefix = parts.next()?;
        let secret = parts.next()?;
        if secret.len() < MIN_SECRET_LEN || prefix.is_empty() {
            return None;
        }
        Some(ParsedToken {
            prefix: prefix.to_string(),
            secret: secret.to_string(),
        })
    }
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

/// Lowercase and sanity-check an email address.
pub fn normalize_email(email: &str) -> Result<String, SessionError> {
    let normalized = email.trim().to_lowercase();
    let valid = match normalized.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !normalized.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(normalized)
    } else {
        Err(SessionError::InvalidEmail(email.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryRepositories;

    fn service(ttl: Duration) -> SessionService {
        SessionService::new(Arc::new(MemoryRepositories::new()), ttl)
    }

    #[tokio::test]
    async fn issued_token_authenticates() {
        let sessions = service(Duration::days(10));
        let issued = sessions.issue(" Ada@Example.com ").await.expect("issue");

        assert!(issued.token.starts_with("hs_"));
        assert_eq!(issued.record.email, "ada@example.com");

        let principal = sessions.authenticate(&issued.token).await.expect("auth");
        assert_eq!(principal.email, "ada@example.com");
        assert_eq!(principal.session_id, issued.record.id);
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let sessions = service(Duration::days(10));
        let issued = sessions.issue("ada@example.com").await.unwrap();
        sessions.revoke(issued.record.id).await.unwrap();

        assert_eq!(
            sessions.authenticate(&issued.token).await,
            Err(AuthError::Revoked)
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let sessions = service(Duration::seconds(-1));
        let issued = sessions.issue("ada@example.com").await.unwrap();

        assert_eq!(
            sessions.authenticate(&issued.token).await,
            Err(AuthError::Expired)
        );
    }

    #[tokio::test]
    async fn tampered_or_malformed_tokens_are_invalid() {
        let sessions = service(Duration::days(10));
        let issued = sessions.issue("ada@example.com").await.unwrap();
        let mut tampered = issued.token.clone();
        tampered.pop();
        tampered.push('x');

        for token in [tampered.as_str(), "hs_short", "sk_abc_def", ""] {
            assert_eq!(
                sessions.authenticate(token).await,
                Err(AuthError::Invalid),
                "token {token:?}"
            );
        }
    }

    #[tokio::test]
    async fn purge_removes_only_expired_sessions() {
        let repo = Arc::new(MemoryRepositories::new());
        let expired = SessionService::new(repo.clone(), Duration::seconds(-1));
        let live = SessionService::new(repo.clone(), Duration::days(1));
        expired.issue("old@example.com").await.unwrap();
        let kept = live.issue("new@example.com").await.unwrap();

        assert_eq!(live.purge_expired().await.unwrap(), 1);
        assert!(live.authenticate(&kept.token).await.is_ok());
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("A@B.io").unwrap(), "a@b.io");
        assert!(normalize_email("nope").is_err());
        assert!(normalize_email("a@@b").is_err());
        assert!(normalize_email("a b@c.d").is_err());
    }
}
