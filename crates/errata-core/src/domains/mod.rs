//! Ready-made failures for the example business domains
//!
//! Each helper returns a [`DomainError`](crate::DomainError) already tagged
//! with its domain, so callers only supply the facts of the failure.

pub mod account;
pub mod admin;
pub mod auth;
pub mod branch;
pub mod system;

use serde_json::Value;

use crate::Details;

pub const ACCOUNT: &str = "account";
pub const AUTH: &str = "auth";
pub const ADMIN: &str = "admin";
pub const BRANCH: &str = "branch";

fn details<const N: usize>(pairs: [(&str, Value); N]) -> Details {
    pairs.into_iter().map(|(key, value)| (key.to_owned(), value)).collect()
}
