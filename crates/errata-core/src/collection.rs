use serde_json::{Value, json};

use crate::convert::lift;
use crate::error::BoxError;
use crate::{CanonicalError, Details, Kind};

/// Message of a collapsed multi-error
pub const MULTIPLE_ERRORS: &str = "Multiple validation errors occurred";

/// Ordered accumulator of independent failures for one domain
///
/// Request-scoped; collapses into one canonical error when surfaced.
#[derive(Debug, Clone, Default)]
pub struct ErrorCollection {
    domain: String,
    errors: Vec<CanonicalError>,
}

impl ErrorCollection {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            errors: Vec::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Lift and append an error, giving it the collection's domain if it has none
    pub fn add(&mut self, err: impl Into<BoxError>) {
        let err = lift(err, &self.domain, &Details::new()).or_domain(&self.domain);
        self.errors.push(err);
    }

    pub fn has(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn count(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalError> {
        self.errors.iter()
    }

    /// Reduce to a single error
    ///
    /// Nothing for an empty collection, the sole error unchanged for one, and
    /// a `VALIDATION_ERROR` listing every error under `details.errors` for more.
    pub fn collapse(mut self) -> Option<CanonicalError> {
        match self.errors.len() {
            0 => None,
            1 => self.errors.pop(),
            _ => {
                let errors: Vec<Value> = self
                    .errors
                    .iter()
                    .map(|err| {
                        json!({
                            "code": err.code(),
                            "message": err.message(),
                            "details": Value::Object(err.details().clone()),
                        })
                    })
                    .collect();

                Some(
                    CanonicalError::new(Kind::Validation, MULTIPLE_ERRORS)
                        .with_domain(self.domain)
                        .with_detail("errors", errors),
                )
            }
        }
    }

    /// Collapse into a `Result`, `Ok` when nothing was collected
    pub fn into_result(self) -> Result<(), CanonicalError> {
        self.collapse().map_or(Ok(()), Err)
    }
}

impl IntoIterator for ErrorCollection {
    type Item = CanonicalError;
    type IntoIter = std::vec::IntoIter<CanonicalError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::DomainError;

    #[test]
    fn empty_collapses_to_nothing() {
        let collection = ErrorCollection::new("account");

        assert!(!collection.has());
        assert!(collection.collapse().is_none());
    }

    #[test]
    fn single_error_is_returned_unchanged() {
        let mut collection = ErrorCollection::new("account");
        collection.add(DomainError::validation("account", "email", "email is required"));

        let err = collection.collapse().unwrap();
        assert_eq!(err.code(), "account_VALIDATION_ERROR");
        assert_eq!(err.message(), "email is required");
    }

    #[test]
    fn errors_inherit_collection_domain() {
        let mut collection = ErrorCollection::new("branch");
        collection.add(CanonicalError::new(Kind::Validation, "bad code"));

        assert_eq!(collection.iter().next().unwrap().domain(), "branch");
    }

    #[test]
    fn errors_keep_their_own_domain() {
        let mut collection = ErrorCollection::new("branch");
        collection.add(DomainError::validation("account", "email", "bad"));

        assert_eq!(collection.iter().next().unwrap().domain(), "account");
    }

    #[test]
    fn many_errors_collapse_in_order() {
        let mut collection = ErrorCollection::new("account");
        collection.add(DomainError::validation_with_value(
            "account",
            "email",
            "email must be a valid email",
            "not-an-email",
        ));
        collection.add(DomainError::validation("account", "password", "password is too short"));

        let err = collection.collapse().unwrap();

        assert_eq!(err.code(), "account_VALIDATION_ERROR");
        assert_eq!(err.message(), MULTIPLE_ERRORS);
        assert_eq!(
            err.details()["errors"],
            json!([
                {
                    "code": "account_VALIDATION_ERROR",
                    "message": "email must be a valid email",
                    "details": {"field": "email", "value": "not-an-email"}
                },
                {
                    "code": "account_VALIDATION_ERROR",
                    "message": "password is too short",
                    "details": {"field": "password"}
                }
            ])
        );
    }

    #[test]
    fn foreign_errors_are_lifted_on_add() {
        let mut collection = ErrorCollection::new("admin");
        collection.add("upstream unavailable");

        assert_eq!(collection.iter().next().unwrap().kind(), Kind::ExternalService);
    }

    proptest! {
        #[test]
        fn collapse_lists_every_error(messages in proptest::collection::vec("[a-z ]{1,20}", 2..12)) {
            let mut collection = ErrorCollection::new("account");
            for message in &messages {
                collection.add(DomainError::validation("account", "field", message.clone()));
            }

            let err = collection.collapse().unwrap();
            let listed = err.details()["errors"].as_array().unwrap();
            prop_assert_eq!(listed.len(), messages.len());
        }
    }
}
