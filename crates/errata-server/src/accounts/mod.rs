//! Account domain routes
//!
//! A small domain wired through every layer: handlers parse and validate,
//! the service applies business rules, the repository classifies storage
//! failures. All of it reports through [`UnifiedErrors`].

mod repository;
mod service;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use errata_core::validate::{Validate, Violations};
use serde::{Deserialize, Serialize};

pub use repository::Account;
pub use service::AccountService;

use crate::context::RequestMeta;
use crate::facade::{ApiError, UnifiedErrors};

const SORT_FIELDS: &[&str] = &["id", "email", "created_at"];

#[derive(Clone)]
struct AccountsState {
    errors: Arc<UnifiedErrors>,
    service: Arc<AccountService>,
}

/// Routes for `/api/accounts` and `/api/auth/login`
pub fn router(errors: Arc<UnifiedErrors>) -> Router {
    let state = AccountsState {
        errors,
        service: Arc::new(AccountService::default()),
    };

    Router::new()
        .route("/api/accounts", get(list_accounts).post(create_account))
        .route("/api/accounts/{id}", get(get_account))
        .route("/api/auth/login", post(login))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateAccount {
    email: String,
    password: String,
}

impl Validate for CreateAccount {
    fn validate(&self, violations: &mut Violations) {
        if violations.required("email", &self.email) {
            violations.email("email", &self.email);
        }
        if violations.required("password", &self.password) {
            violations.password("password", &self.password);
        }
    }
}

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

impl Validate for Credentials {
    fn validate(&self, violations: &mut Violations) {
        violations.required("email", &self.email);
        violations.required("password", &self.password);
    }
}

#[derive(Debug, Serialize)]
struct Page {
    items: Vec<Account>,
    total: i64,
    limit: i64,
    offset: i64,
    page: i64,
    total_pages: i64,
}

#[allow(clippy::needless_pass_by_value)]
async fn list_accounts(
    State(state): State<AccountsState>,
    meta: RequestMeta,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let handler = state.errors.handler(&meta.domain);
    let param = |name: &str| query.get(name).map(String::as_str);

    let pagination = handler.parse_pagination(param("limit"), param("offset"))?;
    let sorting = handler.parse_sort(param("sort_by"), param("sort_order"), SORT_FIELDS)?;

    let (items, total) = state.service.list(pagination, &sorting)?;
    let (page, total_pages) = errata_core::layer::page_info(total, pagination.limit, pagination.offset);

    let page = Page {
        items,
        total,
        limit: pagination.limit,
        offset: pagination.offset,
        page,
        total_pages,
    };

    Ok(state.errors.respond_success(page, &meta))
}

#[allow(clippy::needless_pass_by_value)]
async fn get_account(
    State(state): State<AccountsState>,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = state.errors.handler(&meta.domain).parse_id("id", Some(&id))?;
    let account = state.service.get(id)?;

    Ok(state.errors.respond_success(account, &meta))
}

#[allow(clippy::needless_pass_by_value)]
async fn create_account(
    State(state): State<AccountsState>,
    meta: RequestMeta,
    body: Bytes,
) -> Result<Response, ApiError> {
    let handler = state.errors.handler(&meta.domain);

    let request: CreateAccount = handler.decode_json(&body)?;
    handler.validate_struct(&request)?;

    let account = state.service.register(request.email.trim(), &request.password)?;

    Ok(state.errors.respond_created(account, &meta))
}

#[allow(clippy::needless_pass_by_value)]
async fn login(State(state): State<AccountsState>, meta: RequestMeta, body: Bytes) -> Result<Response, ApiError> {
    let handler = state.errors.handler(&meta.domain);

    let credentials: Credentials = handler.decode_json(&body)?;
    handler.validate_struct(&credentials)?;

    let account = state.service.login(credentials.email.trim(), &credentials.password)?;

    Ok(state.errors.respond_success(account, &meta))
}
