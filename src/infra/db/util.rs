use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const QUERY_CANCELED: &str = "57014";
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Map sqlx failures onto repository errors by Postgres SQLSTATE.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                },
                Some(FOREIGN_KEY_VIOLATION | INVALID_TEXT_REPRESENTATION) => {
                    RepoError::InvalidInput { message }
                }
                Some(CHECK_VIOLATION | NOT_NULL_VIOLATION) => RepoError::Integrity { message },
                Some(QUERY_CANCELED | LOCK_NOT_AVAILABLE) => RepoError::Timeout,
                _ => RepoError::from_persistence(message),
            }
        }
        other => RepoError::from_persistence(other),
    }
}
