//! HTTP server, request dispatch, and graceful shutdown.
//!
//! Dispatch is where the logging pipeline attaches. Per request, in order:
//! the structured request line is emitted synchronously, the access-log
//! clock starts, then routing and the handler run. The completed response
//! carries its access entry inside the body wrapper, so the access line is
//! written only once the transport has sent the last byte.
//!
//! # Graceful shutdown
//!
//! On SIGTERM (what Kubernetes and ECS send) or Ctrl-C the server stops
//! accepting, drains every in-flight connection, syncs the access log, and
//! returns from [`Server::serve`]. Give the orchestrator a grace period
//! longer than your slowest request so the drain can finish.

use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::Error;
use crate::method::Method;
use crate::middleware::{Logging, TimedBody};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
    logging: Option<Logging>,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { bind: Bind::Addr(addr), logging: None }
    }

    /// Serves on an already-bound listener instead of binding in
    /// [`serve`](Server::serve).
    ///
    /// Useful for socket activation and for tests that bind port 0 and need
    /// to know the assigned port before the server starts.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener), logging: None }
    }

    /// Attaches the logging pipeline. Without this the server serves
    /// traffic but logs nothing per request.
    pub fn logging(mut self, logging: Logging) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown: a signal, then all
    /// in-flight requests completing, then the access-log sync.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        let addr = listener.local_addr()?;

        // Arc so router and pipeline are shared across connection tasks
        // without copying the routing table or reopening the log file.
        let router = Arc::new(router);
        let logging = self.logging.map(Arc::new);

        info!(%addr, "tatami listening");

        // Every connection task lands in the JoinSet so shutdown can wait
        // for all of them.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown before the accept queue so a signal stops
                // new connections immediately.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let logging = logging.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection, not
                        // once per connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            let logging = logging.clone();
                            async move { dispatch(router, logging, req, remote_addr).await }
                        });

                        // auto::Builder speaks both HTTP/1.1 and HTTP/2,
                        // whichever the proxy negotiated.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays small on
                // long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain before returning; entries for in-flight responses fire
        // during this wait.
        while tasks.join_next().await.is_some() {}

        // The fired entries are detached appends; flush waits for them to
        // land before the process is allowed to exit.
        if let Some(logging) = &logging {
            if let Err(e) = logging.access.flush().await {
                error!("access log flush on shutdown failed: {e}");
            }
        }

        info!("tatami stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Hot path: logs, routes, and answers one request.
///
/// The error type is [`Infallible`](std::convert::Infallible): every failure
/// becomes an HTTP status here, so hyper never sees an error and every
/// outcome, including 404 and 405, flows through the access log.
async fn dispatch(
    router: Arc<Router>,
    logging: Option<Arc<Logging>>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<TimedBody>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_owned();

    // Stage 1: structured line, synchronous, before anything else runs.
    if let Some(logging) = &logging {
        logging.request.log(&parts.method, &path, &parts.headers, remote_addr);
    }

    // Stage 2: start the access-log clock. The entry travels with the
    // response and fires when the body has been fully sent.
    let entry = logging
        .as_ref()
        .map(|l| l.access.begin(&parts.method, &path, &parts.headers, Some(remote_addr)));

    let response = match Method::from_http(&parts.method) {
        None => Response::status(StatusCode::METHOD_NOT_ALLOWED),
        Some(method) => match router.lookup(method, &path) {
            None => Response::status(StatusCode::NOT_FOUND),
            Some((handler, params)) => match body.collect().await {
                Ok(collected) => {
                    let req = Request::new(parts, collected.to_bytes(), params, remote_addr);
                    handler.call(req).await
                }
                // The client gave up mid-body; answer anyway, hyper will
                // discard the response if the connection is gone.
                Err(_) => Response::status(StatusCode::BAD_REQUEST),
            },
        },
    };

    let status = response.status;
    Ok(response
        .into_http()
        .map(|body| TimedBody::new(body, entry, status)))
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this is SIGTERM or SIGINT; elsewhere only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
