//! # Incoming Request
//!
//! Transport-neutral request handed to the router: raw method string, path,
//! query map, headers and optional body.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Request only handles request data, not response
//! - **O**: Extensible via new builder methods without breaking changes
//! - **D**: Router does not depend on hyper's request type

use crate::error::{Error, Result};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Request};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP PATCH
    Patch,
    /// HTTP DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Patch => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(()),
        }
    }
}

/// A single request as seen by the router
///
/// Built per call and dropped once the response envelope is produced.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// Method as received; anything outside [`Method`] resolves to not found
    pub method: String,
    /// Request path (without query string)
    pub path: String,
    /// Query parameters, keys unique (last value wins)
    pub query: HashMap<String, String>,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body (collected)
    pub body: Option<Bytes>,
}

impl IncomingRequest {
    /// Create a request
    ///
    /// A `?query` suffix on `path` is split off and parsed into
    /// [`IncomingRequest::query`].
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), parse_query_string(Some(q))),
            None => (path, HashMap::new()),
        };

        Self {
            method: method.into(),
            path,
            query,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Add or override a query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set a header, ignoring names or values that are not valid HTTP
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Create from hyper request with body size limit
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` when the declared length or the bytes
    /// read so far exceed `max_body_size`, and `Error::Http` when the body
    /// stream fails.
    pub async fn from_hyper_with_limit(
        req: Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let method = req.method().as_str().to_string();
        let uri = req.uri();
        let path = uri.path().to_string();
        let query = parse_query_string(uri.query());
        let headers = req.headers().clone();

        let declared = headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        if let Some(content_len) = declared {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        // Chunked bodies carry no length; stop reading once past the limit.
        let bytes = Limited::new(req.into_body(), max_body_size)
            .collect()
            .await
            .map_err(|e| body_error(e, max_body_size))?
            .to_bytes();

        Ok(Self {
            method,
            path,
            query,
            headers,
            body: (!bytes.is_empty()).then_some(bytes),
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

fn body_error(err: Box<dyn std::error::Error + Send + Sync>, limit: usize) -> Error {
    if err.is::<LengthLimitError>() {
        return Error::PayloadTooLarge {
            limit,
            actual: limit.saturating_add(1),
        };
    }
    match err.downcast::<hyper::Error>() {
        Ok(err) => Error::Http(*err),
        Err(err) => Error::Io(std::io::Error::other(err)),
    }
}

/// Parse query string into HashMap
///
/// Handles URL decoding and duplicate keys (last value wins).
pub(crate) fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key, true), url_decode(value, true))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Percent-decode a URL component
///
/// `+` becomes a space only for query components. Invalid escapes are kept
/// verbatim and invalid UTF-8 is replaced.
pub(crate) fn url_decode(s: &str, plus_as_space: bool) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' if plus_as_space => out.push(b' '),
            b'%' => {
                let decoded = bytes
                    .get(i + 1..i + 3)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = decoded {
                    out.push(byte);
                    i += 2;
                } else {
                    out.push(b'%');
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
