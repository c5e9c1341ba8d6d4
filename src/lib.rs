//! # tatami
//!
//! A minimal HTTP framework for Rust services behind a reverse proxy, with
//! one opinionated built-in: a per-request logging pipeline.
//!
//! ## The contract
//!
//! The proxy in front (nginx, ALB, ingress) owns TLS, rate limiting, body
//! limits, and slow-client protection. tatami does not reimplement any of
//! that. What the proxy cannot do for you is tell one application log line
//! from another, so tatami carries the request-correlation plumbing itself:
//!
//! - **Structured request log** ([`middleware::RequestLogger`]): one JSON
//!   line per request at arrival, with the `x-request-id` the proxy stamped
//!   on it (or the `no-rid` sentinel when it forgot).
//! - **Access log** ([`middleware::AccessLog`]): one plain-text line per
//!   *completed* request, appended to a shared file with the final status
//!   and millisecond latency. Aborted requests leave no line.
//!
//! Neither stage can fail or delay a request: the request path never waits
//! on a log write, and log failures surface only in diagnostics.
//!
//! The rest is the usual minimal kit: radix-tree routing via [`matchit`],
//! tokio + hyper I/O, graceful shutdown that drains in-flight requests and
//! syncs the access log.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tatami::middleware::{AccessLog, Logging, RequestLogger};
//! use tatami::{Request, Response, Router, Server, StatusCode, health};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tatami::Error> {
//!     let app = Router::new()
//!         .get("/api/health", health::liveness)
//!         .get("/api/tasks/{id}", get_task);
//!
//!     let logging = Logging::new(
//!         RequestLogger::stdout(),
//!         AccessLog::open("logs", "access.log")?,
//!     );
//!
//!     Server::bind("0.0.0.0:3000").logging(logging).serve(app).await
//! }
//!
//! async fn get_task(req: Request) -> Response {
//!     match req.param("id") {
//!         Some(id) => Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes()),
//!         None => Response::status(StatusCode::NOT_FOUND),
//!     }
//! }
//! ```

mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod health;
pub mod middleware;

pub use error::Error;
pub use handler::Handler;
pub use http::StatusCode;
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
