use crate::code::SYSTEM;
use crate::error::BoxError;
use crate::DomainError;

pub fn database(operation: &str, table: &str, cause: impl Into<BoxError>) -> DomainError {
    DomainError::system(
        SYSTEM,
        "database",
        operation,
        format!("Database operation failed on table '{table}'"),
    )
    .with_cause(cause)
}

pub fn cache(operation: &str, key: &str, cause: impl Into<BoxError>) -> DomainError {
    DomainError::system(SYSTEM, "cache", operation, format!("Cache operation failed for key '{key}'")).with_cause(cause)
}

pub fn filesystem(operation: &str, path: &str, cause: impl Into<BoxError>) -> DomainError {
    DomainError::system(
        SYSTEM,
        "filesystem",
        operation,
        format!("File system operation failed for path '{path}'"),
    )
    .with_cause(cause)
}
