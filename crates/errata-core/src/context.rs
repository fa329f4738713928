use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Deadline and cancellation signal carried through one operation
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing cancellation token, e.g. a request's
    pub fn with_token(token: CancellationToken) -> Self {
        Self { deadline: None, token }
    }

    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }
}
