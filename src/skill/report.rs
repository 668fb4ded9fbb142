//! Error reporting, kept separate from reply generation.

use tracing::error;

use crate::skill::envelope::RouteError;

/// Where a reported error came from.
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext<'a> {
    pub request_id: &'a str,
    pub request_type: &'a str,
    pub session_id: &'a str,
}

/// Receives every error caught by the skill's error handler.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &ErrorContext<'_>, error: &RouteError);
}

/// Emits one structured `error!` event per report.
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, context: &ErrorContext<'_>, error: &RouteError) {
        error!(
            request_id = context.request_id,
            request_type = context.request_type,
            session_id = context.session_id,
            error = %error,
            "Error handled"
        );
    }
}
