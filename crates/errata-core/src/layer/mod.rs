//! Per-layer enrichment policies
//!
//! Every wrapper converts foreign failures once, at the edge where they
//! enter, never discards the cause and always stamps its layer.

mod handler;
mod repository;
mod service;

pub use handler::{HandlerLayer, Pagination, SortOrder, Sorting, page_info};
pub use repository::RepositoryLayer;
pub use service::{Rule, RpcCode, RpcStatus, ServiceLayer};
