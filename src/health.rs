//! Built-in health-check handlers.
//!
//! Load balancers and orchestrators poll two questions: is the process
//! alive, and may it receive traffic. Register the stock answers on your
//! router (the ALB target group or Kubernetes probe then points at them):
//!
//! ```rust,no_run
//! use tatami::{Router, health};
//!
//! let app = Router::new()
//!     .get("/api/health", health::liveness)
//!     .get("/readyz", health::readiness);
//! ```
//!
//! Health probes go through the same logging pipeline as every other
//! request, so a probed instance leaves an audit trail of its checks.
//! Replace `readiness` with your own handler when readiness depends on a
//! database or downstream service being reachable.

use crate::{Request, Response};

/// Liveness probe handler.
///
/// Always `200 OK` with body `{"status":"ok"}`. If the process can answer
/// HTTP at all it is alive; this handler intentionally has no dependencies.
pub async fn liveness(_req: Request) -> Response {
    Response::json(br#"{"status":"ok"}"#.to_vec())
}

/// Readiness probe handler (default implementation).
///
/// Returns `200 OK`. Swap in your own handler if the instance needs a
/// warm-up period or must verify dependencies before taking traffic; answer
/// `503 Service Unavailable` to be pulled from rotation.
pub async fn readiness(_req: Request) -> Response {
    Response::json(br#"{"status":"ready"}"#.to_vec())
}
