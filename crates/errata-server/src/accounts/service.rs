use errata_core::layer::{Pagination, Rule, ServiceLayer, Sorting};
use errata_core::{BoxError, CanonicalError, Details, DomainError, Kind, Layer, domains};

use super::repository::{Account, AccountRepository};

/// Account business logic over the repository
///
/// Generic storage failures are replaced with the account domain's own
/// failures wherever the service knows more than the store did.
pub struct AccountService {
    layer: ServiceLayer,
    repository: AccountRepository,
}

impl Default for AccountService {
    fn default() -> Self {
        Self {
            layer: ServiceLayer::new(domains::ACCOUNT),
            repository: AccountRepository::default(),
        }
    }
}

impl AccountService {
    pub fn get(&self, id: i64) -> Result<Account, CanonicalError> {
        self.repository.get(id).map_err(|err| {
            if err.is_not_found() {
                refine(domains::account::user_not_found_by_id(id), err, "get_account")
            } else {
                self.layer.wrap_repository(err, "get_account", Details::new())
            }
        })
    }

    /// One page of accounts and the total count
    ///
    /// Infallible against the in-memory store.
    pub fn list(&self, pagination: Pagination, sorting: &Sorting) -> Result<(Vec<Account>, i64), CanonicalError> {
        Ok(self.repository.list(pagination, sorting))
    }

    pub fn register(&self, email: &str, password: &str) -> Result<Account, CanonicalError> {
        let local_part = email.split('@').next().unwrap_or_default().to_lowercase();
        let lowered = password.to_lowercase();

        let rules: [(&str, Rule<'_>); 1] = [(
            "password_differs_from_email",
            Box::new(move || {
                if local_part.chars().count() >= 3 && lowered.contains(&local_part) {
                    Err(BoxError::from("password must not contain the email address"))
                } else {
                    Ok(())
                }
            }),
        )];
        self.layer.validate_rules(rules)?;

        self.repository.insert(email, password).map_err(|err| {
            if err.kind() == Kind::Duplicate {
                refine(domains::account::duplicate_email(email), err, "register_account")
            } else {
                self.layer.wrap_repository(err, "register_account", Details::new())
            }
        })
    }

    /// Check credentials
    ///
    /// Both failures are authentication errors; the audit `step` tells
    /// operators which check failed while clients see the same status.
    pub fn login(&self, email: &str, password: &str) -> Result<Account, CanonicalError> {
        let account = self.repository.find_by_email(email).map_err(|err| {
            if err.is_not_found() {
                refine(domains::account::email_not_found(email), err, "login")
            } else {
                self.layer.wrap_repository(err, "login", Details::new())
            }
        })?;

        if account.password != password {
            return Err(CanonicalError::from(domains::account::password_mismatch(email))
                .with_layer(Layer::Service)
                .with_operation("login"));
        }

        Ok(account)
    }
}

fn refine(specific: DomainError, cause: CanonicalError, operation: &str) -> CanonicalError {
    CanonicalError::from(specific.with_cause(cause))
        .with_layer(Layer::Service)
        .with_operation(operation)
}
