//! Structured request log: one JSON line per inbound request.
//!
//! The line format is a contract with whatever ships these logs onward
//! (CloudWatch agent, fluentd, `jq` on a box), so it is serialized with
//! serde rather than routed through `tracing` where a subscriber could
//! reshape it. Keys, in order: `timestamp`, `requestId`, `ip`, `method`,
//! `path`, `userAgent`.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use http::HeaderMap;
use serde::Serialize;

use super::{header_str, timestamp};

/// Recorded when the correlation-id header is missing. Deliberately a fixed
/// literal: a flood of `no-rid` lines means the proxy stopped stamping ids,
/// which a locally generated fallback id would mask.
const NO_REQUEST_ID: &str = "no-rid";

/// Field order here is emission order in the JSON line.
#[derive(Serialize)]
struct LogRecord<'a> {
    timestamp: &'a str,
    #[serde(rename = "requestId")]
    request_id: &'a str,
    ip: &'a str,
    method: &'a str,
    path: &'a str,
    #[serde(rename = "userAgent")]
    user_agent: &'a str,
}

/// The arrival-time pipeline stage.
///
/// [`log`](RequestLogger::log) is fully synchronous, touches only headers and
/// metadata, and swallows every failure: a request must never be slowed down
/// or failed by its own log line.
#[derive(Clone)]
pub struct RequestLogger {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl RequestLogger {
    /// Logs to the process's standard output, one JSON object per line.
    pub fn stdout() -> Self {
        Self::to_writer(std::io::stdout())
    }

    /// Logs to an arbitrary writer. Tests inject a buffer here; production
    /// code normally wants [`stdout`](RequestLogger::stdout).
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self { sink: Arc::new(Mutex::new(Box::new(writer))) }
    }

    /// Emits the structured line for one request.
    ///
    /// `requestId` is the `x-request-id` header or the `"no-rid"` sentinel;
    /// `ip` is the raw `x-forwarded-for` value or, absent that, the transport
    /// peer's IP. Serialization and sink errors are dropped on the floor by
    /// contract.
    pub fn log(&self, method: &http::Method, path: &str, headers: &HeaderMap, peer: SocketAddr) {
        let now = timestamp();
        let peer_ip = peer.ip().to_string();
        let record = LogRecord {
            timestamp: &now,
            request_id: header_str(headers, "x-request-id").unwrap_or(NO_REQUEST_ID),
            ip: header_str(headers, "x-forwarded-for").unwrap_or(&peer_ip),
            method: method.as_str(),
            path,
            user_agent: header_str(headers, "user-agent").unwrap_or(""),
        };
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// A sink that refuses every write.
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("sink gone"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("sink gone"))
        }
    }

    fn peer() -> SocketAddr {
        "10.0.0.5:43210".parse().unwrap()
    }

    #[test]
    fn emits_one_json_line_with_ordered_keys() {
        let buf = SharedBuf::default();
        let logger = RequestLogger::to_writer(buf.clone());

        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc123"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.14.1"));
        logger.log(&http::Method::GET, "/api/health", &headers, peer());

        let out = buf.contents();
        assert_eq!(out.lines().count(), 1);
        let line = out.lines().next().unwrap();

        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(v["requestId"], "abc123");
        assert_eq!(v["ip"], "10.0.0.5");
        assert_eq!(v["method"], "GET");
        assert_eq!(v["path"], "/api/health");
        assert_eq!(v["userAgent"], "curl/8.14.1");

        // Key order is part of the line contract.
        let positions: Vec<_> = ["timestamp", "requestId", "ip", "method", "path", "userAgent"]
            .iter()
            .map(|k| line.find(&format!("\"{k}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn missing_request_id_records_sentinel() {
        let buf = SharedBuf::default();
        let logger = RequestLogger::to_writer(buf.clone());
        logger.log(&http::Method::GET, "/", &HeaderMap::new(), peer());

        let v: serde_json::Value = serde_json::from_str(buf.contents().trim()).unwrap();
        assert_eq!(v["requestId"], "no-rid");
        assert_eq!(v["userAgent"], "");
    }

    #[test]
    fn forwarded_for_wins_over_peer() {
        let buf = SharedBuf::default();
        let logger = RequestLogger::to_writer(buf.clone());

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 5.6.7.8"));
        logger.log(&http::Method::POST, "/api/tasks", &headers, peer());

        let v: serde_json::Value = serde_json::from_str(buf.contents().trim()).unwrap();
        // The structured log keeps the whole chain; only the access log
        // narrows it to the first hop.
        assert_eq!(v["ip"], "1.2.3.4, 5.6.7.8");
    }

    #[test]
    fn broken_sink_is_swallowed() {
        let logger = RequestLogger::to_writer(BrokenSink);
        // Must neither panic nor return an error to the caller.
        logger.log(&http::Method::GET, "/", &HeaderMap::new(), peer());
    }
}
