//! Canonical error model shared by every layer of an errata service
//!
//! Any failure, typed or foreign, is lifted once into a [`CanonicalError`]
//! whose wire code is `<domain>_<KIND>`. Nothing here depends on a web
//! framework; the HTTP surface lives in `errata-server`.

#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

mod classify;
mod code;
mod collection;
mod context;
mod convert;
pub mod domains;
mod error;
mod http_error;
mod kind;
pub mod layer;
mod log;
mod sanitize;
mod typed;
pub mod validate;
mod wire;

pub use code::{CodeRegistry, DEFAULT_DOMAINS, SYSTEM, code_for};
pub use collection::{ErrorCollection, MULTIPLE_ERRORS};
pub use context::OperationContext;
pub use convert::{ForeignClass, classify_foreign, classify_message, lift, to_canonical};
pub use error::{BoxError, CanonicalError, Cause, Details, Layer, MAX_CAUSE_DEPTH, render_chain};
pub use http_error::HttpError;
pub use kind::Kind;
pub use log::{Attributes, LogDecision, LogLevel, LogSink, TracingSink, log_decision};
pub use sanitize::{DEFAULT_SENSITIVE_FIELDS, REDACTED, Sanitizer, looks_like_credential};
pub use typed::{DomainError, Failure, Locator};
pub use wire::{ClientPolicy, WireError, WireSuccess};
