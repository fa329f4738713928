use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, FromRequestParts};
use errata_config::RoutingConfig;
use errata_core::SYSTEM;
use http::HeaderMap;
use http::request::Parts;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authenticated caller, inserted by an upstream authentication layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Per-request error metadata
///
/// Built once by the context middleware and read by everything that
/// surfaces an error. Handlers receive it as an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub request_id: String,
    pub domain: String,
    pub method: String,
    pub path: String,
    pub client_ip: Option<String>,
    pub principal: Option<Principal>,
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self {
            request_id: generate_request_id(),
            domain: SYSTEM.to_string(),
            method: String::new(),
            path: String::new(),
            client_ip: None,
            principal: None,
        }
    }
}

impl RequestMeta {
    /// Email of the caller, if one is known
    pub fn email(&self) -> Option<&str> {
        self.principal.as_ref().and_then(|p| p.email.as_deref())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

/// Fresh `req_<unix-nanos>_<0..1000>` identifier
///
/// Client-supplied request IDs are never trusted.
pub fn generate_request_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();

    format!("req_{nanos}_{}", rand::random_range(0..1000))
}

/// Best-effort caller address
///
/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address
/// when the server was started with connect info.
pub fn client_ip(headers: &HeaderMap, extensions: &http::Extensions) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
        && !first.trim().is_empty()
    {
        return Some(first.trim().to_string());
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(val) = real_ip.to_str()
        && !val.trim().is_empty()
    {
        return Some(val.trim().to_string());
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Resolves a request path to the domain that owns it
///
/// The longest matching prefix wins. A prefix matches the path itself or
/// any path below it, so `/api/auth` does not claim `/api/authors`.
/// Unmatched paths belong to `system`.
#[derive(Debug, Clone)]
pub struct DomainRouter {
    routes: Vec<(String, String)>,
}

impl DomainRouter {
    pub fn new<I, P, D>(routes: I) -> Self
    where
        I: IntoIterator<Item = (P, D)>,
        P: Into<String>,
        D: Into<String>,
    {
        let mut routes: Vec<(String, String)> = routes
            .into_iter()
            .map(|(prefix, domain)| {
                let prefix: String = prefix.into();
                (prefix.trim_end_matches('/').to_lowercase(), domain.into())
            })
            .collect();

        routes.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

        Self { routes }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(config.routes.iter().map(|(prefix, domain)| (prefix.as_str(), domain.as_str())))
    }

    pub fn resolve(&self, path: &str) -> &str {
        let path = path.to_lowercase();

        self.routes
            .iter()
            .find(|(prefix, _)| {
                path.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .map_or(SYSTEM, |(_, domain)| domain.as_str())
    }
}

impl Default for DomainRouter {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_routes() {
        let router = DomainRouter::default();

        assert_eq!(router.resolve("/api/accounts"), "account");
        assert_eq!(router.resolve("/api/accounts/42"), "account");
        assert_eq!(router.resolve("/API/Auth/login"), "auth");
        assert_eq!(router.resolve("/api/branches/7/staff"), "branch");
        assert_eq!(router.resolve("/metrics"), "system");
    }

    #[test]
    fn prefix_must_end_on_segment_boundary() {
        let router = DomainRouter::default();
        assert_eq!(router.resolve("/api/authors"), "system");
    }

    #[test]
    fn longest_prefix_wins() {
        let router = DomainRouter::new([("/api", "system"), ("/api/admin", "admin"), ("/api/admin/branches", "branch")]);

        assert_eq!(router.resolve("/api/admin/branches/3"), "branch");
        assert_eq!(router.resolve("/api/admin/users"), "admin");
        assert_eq!(router.resolve("/api/other"), "system");
    }

    #[test]
    fn request_ids_have_expected_shape() {
        let id = generate_request_id();
        let mut parts = id.split('_');

        assert_eq!(parts.next(), Some("req"));
        assert!(parts.next().unwrap().parse::<u128>().is_ok());
        assert!(parts.next().unwrap().parse::<u16>().unwrap() < 1000);
        assert_ne!(generate_request_id(), generate_request_id());
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());

        assert_eq!(client_ip(&headers, &http::Extensions::new()).as_deref(), Some("203.0.113.9"));

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers, &http::Extensions::new()).as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let mut extensions = http::Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 5000))));

        assert_eq!(client_ip(&HeaderMap::new(), &extensions).as_deref(), Some("192.0.2.1"));
    }
}
