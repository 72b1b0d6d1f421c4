use crate::orders::LedgerError;
use crate::password::PasswordError;
use crate::store::StoreError;

/// Errors surfaced by the catalog, petition and account services
///
/// Informational outcomes (already voted, already hidden, ...) are not
/// errors; services return them as values.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The named entity does not exist, or the requester may not see it
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Permission denied")]
    Forbidden,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        CatalogError::Validation(vec![message.into()])
    }

    /// Snake-case code used in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::NotFound(_) => "not_found",
            CatalogError::Validation(_) => "validation_failed",
            CatalogError::Unauthenticated => "unauthenticated",
            CatalogError::Forbidden => "forbidden",
            CatalogError::InvalidCredentials => "invalid_credentials",
            CatalogError::Store(_) | CatalogError::Password(_) | CatalogError::Ledger(_) => {
                "internal_error"
            }
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_and_codes() {
        let err = CatalogError::Validation(vec!["Title is required".into(), "Too long".into()]);
        assert_eq!(err.to_string(), "Validation failed: Title is required; Too long");
        assert_eq!(err.code(), "validation_failed");
        assert_eq!(CatalogError::NotFound("Movie").to_string(), "Movie not found");

        let storage: CatalogError = StoreError::Persistence("disk full".into()).into();
        assert_eq!(storage.code(), "internal_error");
    }
}
