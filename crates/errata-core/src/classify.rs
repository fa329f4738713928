use http::StatusCode;

use crate::{CanonicalError, Kind};

/// Questions callers ask of an error without matching on its kind
impl CanonicalError {
    pub fn is_not_found(&self) -> bool {
        self.kind() == Kind::NotFound
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind(), Kind::Validation | Kind::InvalidInput)
    }

    pub fn is_authentication(&self) -> bool {
        self.kind() == Kind::Authentication
    }

    pub fn is_authorization(&self) -> bool {
        self.kind() == Kind::Authorization
    }

    pub fn is_business_logic(&self) -> bool {
        self.kind() == Kind::BusinessLogic
    }

    /// Upstream failures, including an unavailable dependency
    pub fn is_external_service(&self) -> bool {
        matches!(self.kind(), Kind::ExternalService | Kind::ServiceUnavailable)
    }

    pub fn is_system(&self) -> bool {
        matches!(self.kind(), Kind::System | Kind::Database)
    }

    /// Flagged retryable, or a status that invites a retry
    pub fn is_retryable(&self) -> bool {
        self.retryable()
            || matches!(
                self.status(),
                StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
            )
            || self.status().is_server_error()
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    pub fn is_domain(&self, domain: &str) -> bool {
        self.domain() == domain
    }
}
