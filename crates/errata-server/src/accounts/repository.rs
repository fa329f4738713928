use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

use errata_core::layer::{Pagination, RepositoryLayer, SortOrder, Sorting};
use errata_core::{CanonicalError, Details, domains};
use jiff::Timestamp;
use serde::Serialize;
use serde_json::Value;

const TABLE: &str = "users";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub created_at: Timestamp,
    #[serde(skip)]
    pub(super) password: String,
}

/// Failure reported by the store, worded the way SQL drivers word them
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct DriverError(&'static str);

/// In-memory `users` table
///
/// Stands in for a SQL store: misses and conflicts surface as driver
/// errors and go through the same classification a real driver's would.
/// Credentials are held as given.
pub struct AccountRepository {
    layer: RepositoryLayer,
    rows: RwLock<BTreeMap<i64, Account>>,
    next_id: AtomicI64,
}

impl Default for AccountRepository {
    fn default() -> Self {
        Self {
            layer: RepositoryLayer::new(domains::ACCOUNT),
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl AccountRepository {
    pub fn get(&self, id: i64) -> Result<Account, CanonicalError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);

        rows.get(&id).cloned().ok_or_else(|| {
            self.layer
                .classify(DriverError("sql: no rows in result set"), TABLE, "get_user_by_id", &lookup("id", id))
        })
    }

    pub fn find_by_email(&self, email: &str) -> Result<Account, CanonicalError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);

        rows.values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| {
                self.layer.classify(
                    DriverError("sql: no rows in result set"),
                    TABLE,
                    "get_user_by_email",
                    &lookup("email", email),
                )
            })
    }

    pub fn insert(&self, email: &str, password: &str) -> Result<Account, CanonicalError> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);

        if rows.values().any(|account| account.email.eq_ignore_ascii_case(email)) {
            return Err(self.layer.classify(
                DriverError("UNIQUE constraint failed: users.email"),
                TABLE,
                "create_user",
                &lookup("email", email),
            ));
        }

        let account = Account {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            email: email.to_string(),
            created_at: Timestamp::now(),
            password: password.to_string(),
        };
        rows.insert(account.id, account.clone());

        Ok(account)
    }

    /// One page of accounts plus the total count
    pub fn list(&self, pagination: Pagination, sorting: &Sorting) -> (Vec<Account>, i64) {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);

        let mut accounts: Vec<Account> = rows.values().cloned().collect();
        match sorting.sort_by.as_str() {
            "email" => accounts.sort_by(|a, b| a.email.cmp(&b.email)),
            "id" => accounts.sort_by_key(|account| account.id),
            _ => accounts.sort_by_key(|account| (account.created_at, account.id)),
        }
        if sorting.order == SortOrder::Desc {
            accounts.reverse();
        }

        let total = i64::try_from(accounts.len()).unwrap_or(i64::MAX);
        let skip = usize::try_from(pagination.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(pagination.limit).unwrap_or_default();

        (accounts.into_iter().skip(skip).take(take).collect(), total)
    }
}

fn lookup(key: &str, value: impl Into<Value>) -> Details {
    let mut details = Details::new();
    details.insert(key.to_string(), value.into());
    details
}

#[cfg(test)]
mod tests {
    use errata_core::{Kind, Layer};
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_row_is_not_found() {
        let err = AccountRepository::default().get(42).unwrap_err();

        assert_eq!(err.kind(), Kind::NotFound);
        assert_eq!(err.layer(), Some(Layer::Repository));
        assert_eq!(err.details()["table"], json!("users"));
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let repository = AccountRepository::default();
        repository.insert("a@b.co", "Secret1!x").unwrap();

        let err = repository.insert("A@B.co", "Secret1!x").unwrap_err();
        assert_eq!(err.kind(), Kind::Duplicate);
        assert_eq!(err.details()["field"], json!("email"));
        assert_eq!(err.details()["value"], json!("A@B.co"));
    }

    #[test]
    fn list_pages_and_sorts() {
        let repository = AccountRepository::default();
        for email in ["c@x.io", "a@x.io", "b@x.io"] {
            repository.insert(email, "Secret1!x").unwrap();
        }

        let sorting = Sorting {
            sort_by: "email".into(),
            order: SortOrder::Asc,
        };
        let (page, total) = repository.list(Pagination { limit: 2, offset: 1 }, &sorting);

        assert_eq!(total, 3);
        let emails: Vec<_> = page.iter().map(|account| account.email.as_str()).collect();
        assert_eq!(emails, ["b@x.io", "c@x.io"]);
    }
}
