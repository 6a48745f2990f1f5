use thiserror::Error;

/// Input that breaks a domain rule before anything is persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("invalid {field}: {message}")]
    Malformed {
        field: &'static str,
        message: String,
    },
    #[error("{message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn malformed(field: &'static str, message: impl ToString) -> Self {
        Self::Malformed {
            field,
            message: message.to_string(),
        }
    }

    /// Trimmed `value`, checked against `max` characters.
    pub fn bounded(field: &'static str, value: &str, max: usize) -> Result<String, Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Self::Empty { field });
        }
        if trimmed.chars().count() > max {
            return Err(Self::TooLong { field, max });
        }
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_trims_and_checks_length() {
        assert_eq!(DomainError::bounded("name", "  Ada ", 5), Ok("Ada".to_string()));
        assert_eq!(
            DomainError::bounded("name", "   ", 5),
            Err(DomainError::Empty { field: "name" })
        );
        assert_eq!(
            DomainError::bounded("name", "Lovelace", 5).unwrap_err().to_string(),
            "name exceeds 5 characters"
        );
    }
}
