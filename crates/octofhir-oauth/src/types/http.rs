//! Transport-level request and response types.
//!
//! The engine never runs a server. Callers translate their framework's
//! request into an [`HttpRequest`] and hand an [`HttpResponse`] to the
//! `write_*` operations.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::Form;

/// Response sink for the `write_*` operations.
pub type HttpResponse = axum::http::Response<Body>;

/// An incoming HTTP request, reduced to what the engine reads.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,

    /// Request headers.
    pub headers: HeaderMap,

    /// Parsed form body (POST) or query (GET).
    pub form: Form,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::post(Form::new())
    }
}

impl HttpRequest {
    /// Creates a POST request with a form body.
    #[must_use]
    pub fn post(form: Form) -> Self {
        Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            form,
        }
    }

    /// Creates a GET request with query parameters.
    #[must_use]
    pub fn get(query: Form) -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            form: query,
        }
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Adds an HTTP Basic `Authorization` header.
    #[must_use]
    pub fn with_basic_auth(self, client_id: &str, client_secret: &str) -> Self {
        let encoded = STANDARD.encode(format!("{client_id}:{client_secret}"));
        self.with_header(header::AUTHORIZATION.as_str(), &format!("Basic {encoded}"))
    }

    /// Returns the Basic credentials from the `Authorization` header.
    #[must_use]
    pub fn basic_auth(&self) -> Option<(String, String)> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_basic_auth)
    }
}

/// Parses HTTP Basic authentication credentials.
///
/// Returns `(client_id, client_secret)`, or `None` for anything that is not
/// a well-formed `Basic` header. The password may contain colons.
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (client_id, client_secret) = credentials.split_once(':')?;
    Some((client_id.to_string(), client_secret.to_string()))
}
