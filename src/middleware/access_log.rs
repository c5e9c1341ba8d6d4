//! Access log: one plain-text line per *completed* request.
//!
//! Line layout, space-separated, newline-terminated:
//!
//! ```text
//! <ISO-8601 timestamp> <client-address> <METHOD> <path> <status> <duration>ms
//! 2025-11-04T10:47:26.512Z 172.21.0.1 GET /api/health 200 0.8ms
//! ```
//!
//! The file is opened once at startup in append mode and shared by every
//! in-flight request. Each completed request appends its whole line with a
//! single write on that descriptor, which is what keeps concurrent lines
//! from interleaving; no in-process lock is needed. Rotation and retention
//! belong to external log management, so this module never reads, trims, or
//! reopens the file.

use std::convert::Infallible;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use hyper::body::{Body, Frame, SizeHint};
use tokio::sync::Notify;
use tracing::error;

use super::{header_str, timestamp};
use crate::error::Error;

/// The completion-time pipeline stage: owns the shared access-log file.
///
/// Construct once at startup with [`open`](AccessLog::open); startup must
/// fail if the log directory cannot be prepared. Per request, call
/// [`begin`](AccessLog::begin) at arrival and hand the returned entry to the
/// response; nothing is written until the response finishes.
pub struct AccessLog {
    file: Arc<File>,
    path: PathBuf,
    pending: Arc<Pending>,
}

/// Count of appends handed to the blocking pool but not yet on disk.
///
/// The request path never waits on this; only the shutdown
/// [`flush`](AccessLog::flush) does, so the last responses' lines land
/// before the process exits.
#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    notify: Notify,
}

impl Pending {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn end(&self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
        // notify_one stores a permit when no flush is waiting yet, so an
        // append finishing between the flusher's check and its await is not
        // lost.
        self.notify.notify_one();
    }
}

impl AccessLog {
    /// Prepares the log directory and opens (or creates) the log file for
    /// appending.
    ///
    /// Directory creation is idempotent: an existing directory is fine, and
    /// calling this twice succeeds twice. Any other creation failure is
    /// returned as [`Error::LogDir`] and should abort startup.
    pub fn open(dir: impl AsRef<Path>, filename: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| Error::LogDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(filename);
        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        Ok(Self {
            file: Arc::new(file),
            path,
            pending: Arc::new(Pending::default()),
        })
    }

    /// Path of the log file, as opened.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts the clock for one request. Call at arrival, before the handler.
    ///
    /// Cheap and synchronous: it snapshots a monotonic instant and the
    /// request fields the eventual line needs, nothing more.
    pub fn begin(
        &self,
        method: &http::Method,
        path: &str,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
    ) -> AccessEntry {
        AccessEntry {
            file: Arc::clone(&self.file),
            pending: Arc::clone(&self.pending),
            start: Instant::now(),
            client: client_addr(header_str(headers, "x-forwarded-for"), peer.map(|p| p.ip())),
            method: method.as_str().to_owned(),
            path: path.to_owned(),
        }
    }

    /// Waits for every in-flight append to land, then syncs the file to
    /// disk. The server calls this once during graceful shutdown, after
    /// draining connections; the final responses' appends are detached
    /// tasks, so the drain alone does not cover them.
    pub async fn flush(&self) -> io::Result<()> {
        while self.pending.count.load(Ordering::Acquire) > 0 {
            self.pending.notify.notified().await;
        }
        self.file.sync_all()
    }
}

/// One request's pending access-log line.
///
/// Created at arrival, consumed by [`finish`](AccessEntry::finish) when the
/// response has been fully sent. Move semantics give the at-most-once
/// guarantee; an entry dropped unfinished (client went away first) writes
/// nothing, which is the intended behavior for aborted requests.
pub struct AccessEntry {
    file: Arc<File>,
    pending: Arc<Pending>,
    start: Instant,
    client: String,
    method: String,
    path: String,
}

impl AccessEntry {
    /// Renders the line and appends it, fire-and-forget.
    ///
    /// The write runs on the blocking pool and nothing in the request path
    /// awaits it; a failed append is reported via `tracing` and dropped,
    /// never retried, never visible to the client.
    pub fn finish(self, status: StatusCode) {
        let millis = self.start.elapsed().as_secs_f64() * 1000.0;
        let line = format!(
            "{} {} {} {} {} {millis:.1}ms\n",
            timestamp(),
            self.client,
            self.method,
            self.path,
            status.as_u16(),
        );
        let file = self.file;
        let pending = self.pending;
        pending.begin();
        let write = move || {
            // One write_all per line on an append-mode fd; the kernel
            // serializes concurrent appends so lines never interleave.
            if let Err(e) = (&*file).write_all(line.as_bytes()) {
                error!("access log append failed: {e}");
            }
            pending.end();
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            // No runtime left to hand the write to (late teardown); there
            // is nothing to keep non-blocking for either, so write inline.
            Err(_) => write(),
        }
    }
}

/// Client address for the access line.
///
/// First entry of the forwarded chain if it is non-empty after trimming,
/// else the transport peer, else `"unknown"`.
fn client_addr(forwarded: Option<&str>, peer: Option<IpAddr>) -> String {
    if let Some(chain) = forwarded {
        if let Some(first) = chain.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    match peer {
        Some(ip) => ip.to_string(),
        None => "unknown".to_owned(),
    }
}

// ── Completion hook ──────────────────────────────────────────────────────────

/// Response body wrapper that fires the access entry once the transport has
/// taken the last byte.
///
/// hyper polls the body only while it still has bytes to send: with a fixed
/// `content-length` it stops at the last data frame rather than polling on
/// to `None`, and for responses with nothing to send (404s and 204s with
/// empty bodies, HEAD) it never polls at all, it just drops the body after
/// writing the head. So the entry fires in two places, exactly once:
///
/// - in `poll_frame`, the moment the frame that drains the body is yielded;
/// - in `Drop`, when a never-polled body had no bytes to begin with.
///
/// A body dropped with bytes still queued is an aborted response and stays
/// silent. That is the whole "only on clean completion" contract, enforced
/// by ownership rather than bookkeeping.
pub(crate) struct TimedBody {
    inner: Full<Bytes>,
    entry: Option<AccessEntry>,
    status: StatusCode,
}

impl TimedBody {
    pub(crate) fn new(inner: Full<Bytes>, entry: Option<AccessEntry>, status: StatusCode) -> Self {
        Self { inner, entry, status }
    }

    fn complete(&mut self) {
        if let Some(entry) = self.entry.take() {
            entry.finish(self.status);
        }
    }

    fn drained(&self) -> bool {
        self.inner.is_end_stream() || self.inner.size_hint().exact() == Some(0)
    }
}

impl Body for TimedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.inner).poll_frame(cx);
        match &res {
            Poll::Ready(Some(Ok(_))) if this.drained() => this.complete(),
            Poll::Ready(None) => this.complete(),
            _ => {}
        }
        res
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TimedBody {
    fn drop(&mut self) {
        if self.drained() {
            self.complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn peer() -> SocketAddr {
        "10.0.0.5:55555".parse().unwrap()
    }

    /// Reads the file until it holds `n` newline-terminated lines or the
    /// deadline passes. The appends are detached tasks, so tests poll.
    async fn wait_for_lines(path: &Path, n: usize) -> Vec<String> {
        for _ in 0..200 {
            let text = fs::read_to_string(path).unwrap_or_default();
            if text.ends_with('\n') && text.lines().count() >= n {
                return text.lines().map(str::to_owned).collect();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("access log never reached {n} lines");
    }

    #[test]
    fn client_addr_prefers_first_forwarded_entry() {
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        assert_eq!(client_addr(Some("1.2.3.4, 5.6.7.8"), Some(ip)), "1.2.3.4");
        assert_eq!(client_addr(Some("  1.2.3.4  "), Some(ip)), "1.2.3.4");
        assert_eq!(client_addr(None, Some(ip)), "10.0.0.5");
        // Present but empty after trimming falls through the whole chain.
        assert_eq!(client_addr(Some("   "), None), "unknown");
        assert_eq!(client_addr(None, None), "unknown");
    }

    #[test]
    fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let first = AccessLog::open(&logs, "access.log").unwrap();
        let second = AccessLog::open(&logs, "access.log").unwrap();
        assert_eq!(first.path(), second.path());
    }

    #[test]
    fn open_fails_when_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let obstacle = dir.path().join("logs");
        fs::write(&obstacle, b"not a directory").unwrap();

        let err = AccessLog::open(&obstacle, "access.log")
            .err()
            .expect("opening under a file must fail");
        match err {
            Error::LogDir { path, .. } => assert_eq!(path, obstacle),
            other => panic!("expected LogDir error, got {other}"),
        }
    }

    #[tokio::test]
    async fn finished_entry_writes_one_well_formed_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::open(dir.path(), "access.log").unwrap();

        let entry = log.begin(&http::Method::GET, "/api/health", &HeaderMap::new(), Some(peer()));
        tokio::time::sleep(Duration::from_millis(2)).await;
        entry.finish(StatusCode::OK);

        let lines = wait_for_lines(log.path(), 1).await;
        assert_eq!(lines.len(), 1);

        let fields: Vec<&str> = lines[0].split(' ').collect();
        assert_eq!(fields.len(), 6);
        assert!(chrono::DateTime::parse_from_rfc3339(fields[0]).is_ok());
        assert_eq!(fields[1], "10.0.0.5");
        assert_eq!(fields[2], "GET");
        assert_eq!(fields[3], "/api/health");
        assert_eq!(fields[4], "200");

        // Exactly one digit after the decimal point, non-negative.
        let duration = fields[5].strip_suffix("ms").unwrap();
        let (whole, frac) = duration.split_once('.').unwrap();
        assert!(whole.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(frac.len(), 1);
        assert!(frac.chars().all(|c| c.is_ascii_digit()));
        assert!(duration.parse::<f64>().unwrap() >= 2.0);
    }

    #[tokio::test]
    async fn dropped_entry_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::open(dir.path(), "access.log").unwrap();

        let entry = log.begin(&http::Method::GET, "/slow", &HeaderMap::new(), Some(peer()));
        drop(entry);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let text = fs::read_to_string(log.path()).unwrap();
        assert!(text.is_empty(), "aborted request must not be logged: {text:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_do_not_interleave() {
        const N: usize = 300;

        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::open(dir.path(), "access.log").unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..N {
            let entry = log.begin(
                &http::Method::GET,
                &format!("/p{i}"),
                &HeaderMap::new(),
                Some(peer()),
            );
            tasks.spawn(async move { entry.finish(StatusCode::OK) });
        }
        while tasks.join_next().await.is_some() {}

        let lines = wait_for_lines(log.path(), N).await;
        assert_eq!(lines.len(), N);

        let mut seen: Vec<&str> = lines
            .iter()
            .map(|l| {
                let fields: Vec<&str> = l.split(' ').collect();
                assert_eq!(fields.len(), 6, "interleaved or partial line: {l:?}");
                assert!(fields[5].ends_with("ms"));
                fields[3]
            })
            .collect();
        seen.sort_unstable_by_key(|p| p[2..].parse::<usize>().unwrap());
        for (i, path) in seen.iter().enumerate() {
            assert_eq!(*path, format!("/p{i}"));
        }
    }

    #[tokio::test]
    async fn timed_body_fires_when_polled_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::open(dir.path(), "access.log").unwrap();

        let entry = log.begin(&http::Method::GET, "/done", &HeaderMap::new(), Some(peer()));
        let body = TimedBody::new(
            Full::new(Bytes::from_static(b"ok")),
            Some(entry),
            StatusCode::OK,
        );
        let collected = http_body_util::BodyExt::collect(body).await.unwrap();
        assert_eq!(collected.to_bytes().as_ref(), b"ok");

        let lines = wait_for_lines(log.path(), 1).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" /done 200 "));
    }

    /// The transport never polls a body it has no bytes to send from (empty
    /// 404/204, HEAD); completion for those is the drop of the drained body.
    #[tokio::test]
    async fn timed_body_empty_body_fires_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::open(dir.path(), "access.log").unwrap();

        let entry = log.begin(&http::Method::GET, "/empty", &HeaderMap::new(), Some(peer()));
        let body = TimedBody::new(
            Full::new(Bytes::new()),
            Some(entry),
            StatusCode::NO_CONTENT,
        );
        drop(body);

        let lines = wait_for_lines(log.path(), 1).await;
        assert!(lines[0].contains(" /empty 204 "));
    }

    #[tokio::test]
    async fn timed_body_mid_stream_drop_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::open(dir.path(), "access.log").unwrap();

        let entry = log.begin(&http::Method::GET, "/aborted", &HeaderMap::new(), Some(peer()));
        let body = TimedBody::new(
            Full::new(Bytes::from_static(b"never sent")),
            Some(entry),
            StatusCode::OK,
        );
        drop(body);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let text = fs::read_to_string(log.path()).unwrap();
        assert!(text.is_empty(), "aborted response must not be logged: {text:?}");
    }

    /// Appends are detached; flush is the one place that waits for them, so
    /// the file is complete the moment it returns.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn flush_waits_for_detached_appends() {
        const N: usize = 50;

        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::open(dir.path(), "access.log").unwrap();

        for i in 0..N {
            log.begin(&http::Method::GET, &format!("/f{i}"), &HeaderMap::new(), Some(peer()))
                .finish(StatusCode::OK);
        }
        log.flush().await.unwrap();

        // No polling: every line must already be on disk.
        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), N);
        assert!(text.ends_with('\n'));
    }
}
