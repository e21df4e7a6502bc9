//! Error-to-response translation.

use bytes::Bytes;

use crate::errors::{ClientError, HandlerError, INTERNAL_ERROR_BODY};
use crate::transport::MicroRequest;

/// Write the error response for `err` and log what the caller must not see.
///
/// Client errors answer with their own status and body; their causes go to
/// the log only. Anything else is logged and answered with a generic 500.
pub fn handle_request_error<R: MicroRequest>(err: &HandlerError, req: &R) {
    let written = match err {
        HandlerError::Client(ce) => {
            log_causes(ce);
            req.error(&ce.code().to_string(), ce.status_text(), Bytes::from(ce.body()))
        }
        HandlerError::Internal(e) => {
            tracing::error!(error = %e, "Handler failed");
            req.error(
                "500",
                "internal server error",
                Bytes::from_static(INTERNAL_ERROR_BODY),
            )
        }
    };

    if let Err(e) = written {
        tracing::warn!(error = %e, "Failed to write error response");
    }
}

pub(crate) fn log_causes(ce: &ClientError) {
    for cause in ce.logged_errors() {
        tracing::error!(status = ce.code(), error = %cause, "Client error");
    }
}
