use http::StatusCode;

/// Errors that know how they surface over HTTP
///
/// The core stays free of any web framework; the server crate turns
/// implementors into responses.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable code, e.g. `account_NOT_FOUND`
    fn error_type(&self) -> String;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}
