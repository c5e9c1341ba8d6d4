//! The per-request logging pipeline.
//!
//! Two independent stages run for every request the server accepts, in
//! registration order, before any handler:
//!
//! - [`RequestLogger`] emits one structured JSON line at *arrival*, carrying
//!   the correlation id the upstream proxy stamped on the request.
//! - [`AccessLog`] starts a monotonic clock at arrival and appends one
//!   plain-text line to a shared file when the response has been *fully
//!   sent*, with the elapsed time.
//!
//! The stages share no state and neither may ever delay or fail a request:
//! the structured line is written synchronously to an in-process sink, the
//! access line is appended by a detached task whose only failure handling is
//! a diagnostic `tracing::error!`. A connection that dies before the response
//! completes simply produces no access line.
//!
//! Correlation ids are *consumed*, never minted: if `x-request-id` is absent
//! the pipeline records the `"no-rid"` sentinel so the gap is visible in the
//! logs. Generating ids is the edge proxy's job, and doing it here as well
//! would hide a misconfigured proxy.

mod access_log;
mod request_log;

pub use access_log::{AccessEntry, AccessLog};
pub(crate) use access_log::TimedBody;
pub use request_log::RequestLogger;

use chrono::{SecondsFormat, Utc};
use http::HeaderMap;

/// Both pipeline stages, bundled for [`Server::logging`](crate::Server::logging).
pub struct Logging {
    pub(crate) request: RequestLogger,
    pub(crate) access: AccessLog,
}

impl Logging {
    pub fn new(request: RequestLogger, access: AccessLog) -> Self {
        Self { request, access }
    }
}

/// ISO-8601 UTC instant with millisecond precision, e.g.
/// `2025-11-04T10:47:26.512Z`. Shared line-format vocabulary for both sinks.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Case-insensitive header lookup as a UTF-8 string; non-ASCII values are
/// treated as absent.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
