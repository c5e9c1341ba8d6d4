//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::HeaderMap;

/// An incoming HTTP request, with its body fully read and route parameters
/// resolved.
///
/// Handlers receive this by value. The body is buffered before dispatch
/// (streaming uploads are a proxy concern, not ours), so `body()` is plain
/// bytes with no await.
pub struct Request {
    parts: http::request::Parts,
    body: Bytes,
    params: HashMap<String, String>,
    peer: SocketAddr,
}

impl Request {
    pub(crate) fn new(
        parts: http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
        peer: SocketAddr,
    ) -> Self {
        Self { parts, body, params, peer }
    }

    pub fn method(&self) -> &http::Method {
        &self.parts.method
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Transport-level peer address of the connection this request arrived on.
    ///
    /// Behind a reverse proxy this is the proxy, not the end client; consult
    /// `x-forwarded-for` (as the logging pipeline does) for the latter.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Case-insensitive header lookup, as a UTF-8 string.
    ///
    /// Returns `None` for absent headers and for values that are not valid
    /// visible-ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/tasks/{id}`, `req.param("id")` on `/tasks/42` returns
    /// `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
