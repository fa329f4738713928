use std::fmt;

use http::StatusCode;
use strum::{Display, EnumString};

use crate::context::OperationContext;
use crate::convert::{classify_message, from_class, lift};
use crate::error::BoxError;
use crate::{CanonicalError, Details, DomainError, ErrorCollection, Kind, Layer};

/// Status of a cancelled operation; nginx's "client closed request"
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// A named business check run by [`ServiceLayer::validate_rules`]
pub type Rule<'a> = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'a>;

/// Canonical gRPC status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum RpcCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

/// A gRPC-style failure: a status code and a description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error: code = {} desc = {}", self.code, self.message)
    }
}

impl std::error::Error for RpcStatus {}

/// Business boundary of a domain
///
/// Errors crossing it are lifted once, stamped `layer=service` and given the
/// operation that was in flight.
#[derive(Debug, Clone)]
pub struct ServiceLayer {
    domain: String,
}

impl ServiceLayer {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into() }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Lift a repository failure and add the caller's context
    pub fn wrap_repository(&self, err: impl Into<BoxError>, operation: &str, context: Details) -> CanonicalError {
        lift(err, &self.domain, &context)
            .or_domain(&self.domain)
            .with_layer(Layer::Service)
            .with_operation(operation)
            .with_details(context)
    }

    pub fn business_rule(&self, rule: &str, description: impl Into<String>, context: Details) -> CanonicalError {
        self.stamp(DomainError::business_rule_with(&self.domain, rule, description, context))
    }

    /// Run every rule and collapse the failures
    ///
    /// A rule failing with a plain error becomes a business rule violation
    /// named after the rule; canonical and typed errors are kept as they are.
    pub fn validate_rules<'a>(
        &self,
        rules: impl IntoIterator<Item = (&'a str, Rule<'a>)>,
    ) -> Result<(), CanonicalError> {
        let mut collection = ErrorCollection::new(self.domain.as_str());

        for (name, rule) in rules {
            let Err(err) = rule() else { continue };

            if err.is::<CanonicalError>() || err.is::<DomainError>() {
                collection.add(err);
            } else {
                collection.add(DomainError::business_rule(&self.domain, name, err.to_string()));
            }
        }

        collection.into_result().map_err(|err| err.with_layer(Layer::Service))
    }

    /// Failure of a call to a third-party dependency
    pub fn external_call(
        &self,
        err: impl Into<BoxError>,
        service: &str,
        operation: &str,
        retryable: bool,
    ) -> CanonicalError {
        let err = err.into();
        let typed = DomainError::external_service(&self.domain, service, operation, err.to_string(), retryable);

        self.stamp(typed.with_cause(err)).with_operation(operation)
    }

    /// Failed database transaction
    pub fn transaction(&self, err: impl Into<BoxError>, operation: &str) -> CanonicalError {
        let typed = DomainError::system(&self.domain, "database_transaction", operation, "Transaction failed");

        self.stamp(typed.with_cause(err)).with_operation(operation)
    }

    /// Error for an expired or cancelled operation, `None` while it may proceed
    pub fn from_ctx(&self, ctx: &OperationContext, operation: &str) -> Option<CanonicalError> {
        if ctx.deadline_exceeded() {
            return Some(self.stamp(DomainError::timeout(&self.domain, operation)).with_operation(operation));
        }

        if ctx.is_cancelled() {
            let status = StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST);

            return Some(
                CanonicalError::new(Kind::System, "Operation was cancelled")
                    .with_status(status)
                    .with_domain(self.domain.as_str())
                    .with_layer(Layer::Service)
                    .with_operation(operation),
            );
        }

        None
    }

    /// Classify a gRPC failure
    ///
    /// The description goes through the foreign-message matcher first; the
    /// status code decides when the description matches nothing.
    pub fn from_grpc(&self, status: RpcStatus, operation: &str, context: Details) -> CanonicalError {
        let err = match classify_message(&status.message) {
            Some(class) => from_class(class, &self.domain, &context, &status.message),
            None => self.from_rpc_code(&status, operation, &context),
        };

        err.with_cause(status)
            .with_layer(Layer::Service)
            .with_operation(operation)
            .with_details(context)
    }

    fn from_rpc_code(&self, status: &RpcStatus, operation: &str, context: &Details) -> CanonicalError {
        let domain = self.domain.as_str();
        let resource_type = if domain.is_empty() { "resource" } else { domain };

        let typed = match status.code {
            RpcCode::NotFound => DomainError::not_found_by(domain, resource_type, context.clone()),
            RpcCode::InvalidArgument | RpcCode::OutOfRange => {
                DomainError::invalid_input(domain, status.message.as_str(), Details::new())
            }
            RpcCode::AlreadyExists => {
                return CanonicalError::new(Kind::Duplicate, status.message.as_str()).with_domain(domain);
            }
            RpcCode::Unauthenticated => {
                DomainError::authentication_at(domain, status.message.as_str(), "rpc", Details::new())
            }
            RpcCode::PermissionDenied => DomainError::authorization(domain, operation, resource_type),
            RpcCode::FailedPrecondition => {
                DomainError::business_rule(domain, "failed_precondition", status.message.as_str())
            }
            RpcCode::Aborted => DomainError::conflict(domain, resource_type, status.message.as_str()),
            RpcCode::ResourceExhausted => DomainError::rate_limited(domain, operation, None, None),
            RpcCode::DeadlineExceeded => DomainError::timeout(domain, operation),
            RpcCode::Unavailable => DomainError::external_service(domain, "grpc", operation, status.message.as_str(), true),
            RpcCode::Ok
            | RpcCode::Cancelled
            | RpcCode::Unknown
            | RpcCode::Unimplemented
            | RpcCode::Internal
            | RpcCode::DataLoss => DomainError::system(domain, "grpc", operation, status.message.as_str()),
        };

        typed.into()
    }

    fn stamp(&self, err: DomainError) -> CanonicalError {
        CanonicalError::from(err).with_layer(Layer::Service)
    }
}
