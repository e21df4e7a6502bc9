//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! transport Service
//!     → handler.rs (ErrorHandler: correlation ID, logging, bridge, span)
//!     → bridge.rs (X-NatsBridge-UrlQuery → X-Sencillo-*)
//!     → carrier.rs (trace context in/out of headers)
//!     → application handler(Context, request, HandlerContext)
//!     → respond.rs (HandlerError → error reply)
//! ```
//!
//! # Design Decisions
//! - The dispatcher holds no per-request state and takes no locks
//! - Traced and untraced services share one pipeline; without telemetry the
//!   span steps are no-ops
//! - Handler errors are classified by `ErrorKind`, never by probing types

pub mod bridge;
pub mod carrier;
pub mod context;
pub mod handler;
pub mod message;
pub mod respond;

pub use bridge::{
    bridged_key, build_query_headers, query_values, BridgeError, BRIDGED_PREFIX,
    BRIDGE_QUERY_HEADER,
};
pub use carrier::{extract_trace_context, inject_trace_headers, HeaderCarrier};
pub use context::{AppContext, HandlerContext, Telemetry};
pub use handler::{AppHandler, ErrorHandler};
pub use message::{
    msg_id, new_msg_with_id, request_logger, request_to_msg, MissingRequestId, X_REQUEST_ID,
};
pub use respond::handle_request_error;
