//! OAuth 2.0 error types.
//!
//! Every failure inside the engine is an [`OAuthError`]: a classification
//! ([`ErrorKind`]) plus a human-readable description, an optional hint and an
//! optional debug string. The debug string only reaches the wire when the
//! provider is configured to expose debug messages to clients.
//!
//! [`ErrorKind::UnknownRequest`] is special: handlers return it when they are
//! not responsible for a request, and the dispatch loop consumes it to move
//! on to the next handler. It never surfaces past the provider.

use std::fmt;

use serde::Serialize;

/// Classification of an OAuth error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The handler is not responsible for this request.
    UnknownRequest,
    /// The request is missing a parameter or is otherwise malformed.
    InvalidRequest,
    /// Client authentication failed.
    InvalidClient,
    /// The grant or refresh token is invalid, expired, revoked or mismatched.
    InvalidGrant,
    /// The requested scope is invalid, unknown, or malformed.
    InvalidScope,
    /// The client is not authorized to use this grant.
    UnauthorizedClient,
    /// The grant type is not supported.
    UnsupportedGrantType,
    /// The response type is not supported.
    UnsupportedResponseType,
    /// The resource owner or authorization server denied the request.
    AccessDenied,
    /// The request could not be authorized.
    RequestUnauthorized,
    /// The token expired.
    TokenExpired,
    /// The token signature does not match any known secret or key.
    TokenSignatureMismatch,
    /// The token is inactive (revoked or otherwise invalidated).
    InactiveToken,
    /// The storage backend refused a conflicting write.
    Conflict,
    /// The storage backend failed.
    Storage,
    /// Signing or encoding a token failed.
    Signing,
    /// No registered handler claimed the request.
    NoApplicableHandler,
    /// The operation is not implemented by this engine.
    NotImplemented,
    /// Unexpected server-side condition.
    ServerError,
}

impl ErrorKind {
    /// Returns the error code used on the wire.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownRequest => "unknown_request",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidScope => "invalid_scope",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::AccessDenied => "access_denied",
            Self::RequestUnauthorized => "request_unauthorized",
            Self::TokenExpired => "invalid_token",
            Self::TokenSignatureMismatch => "token_signature_mismatch",
            Self::InactiveToken => "token_inactive",
            Self::Conflict => "conflict",
            Self::Storage => "server_error",
            Self::Signing => "server_error",
            Self::NoApplicableHandler => "no_applicable_handler",
            Self::NotImplemented => "not_implemented",
            Self::ServerError => "server_error",
        }
    }

    /// Returns the HTTP status code used when writing this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidClient
            | Self::RequestUnauthorized
            | Self::TokenExpired
            | Self::TokenSignatureMismatch
            | Self::InactiveToken => 401,
            Self::AccessDenied => 403,
            Self::Conflict => 409,
            Self::Storage | Self::Signing | Self::ServerError => 500,
            Self::NotImplemented => 501,
            _ => 400,
        }
    }

    /// Returns the default English description for this kind.
    #[must_use]
    pub fn default_description(&self) -> &'static str {
        match self {
            Self::UnknownRequest => "The handler is not responsible for this request.",
            Self::InvalidRequest => {
                "The request is missing a required parameter, includes an invalid parameter value, includes a parameter more than once, or is otherwise malformed."
            }
            Self::InvalidClient => {
                "Client authentication failed (e.g., unknown client, no client authentication included, or unsupported authentication method)."
            }
            Self::InvalidGrant => {
                "The provided authorization grant (e.g., authorization code, resource owner credentials) or refresh token is invalid, expired, revoked, does not match the redirection URI used in the authorization request, or was issued to another client."
            }
            Self::InvalidScope => "The requested scope is invalid, unknown, or malformed.",
            Self::UnauthorizedClient => {
                "The client is not authorized to request a token using this method."
            }
            Self::UnsupportedGrantType => {
                "The authorization grant type is not supported by the authorization server."
            }
            Self::UnsupportedResponseType => {
                "The authorization server does not support obtaining a token using this method."
            }
            Self::AccessDenied => "The resource owner or authorization server denied the request.",
            Self::RequestUnauthorized => "The request could not be authorized.",
            Self::TokenExpired => "Token expired. The token expired.",
            Self::TokenSignatureMismatch => {
                "Token signature mismatch. Check that you provided a valid token in the right format."
            }
            Self::InactiveToken => {
                "Token is inactive because it is malformed, expired or otherwise invalid. Token validation failed."
            }
            Self::Conflict => "The resource already exists with different contents.",
            Self::Storage => "The storage backend failed to process the request.",
            Self::Signing => "The authorization server failed to sign the token.",
            Self::NoApplicableHandler => "No registered handler is able to process this request.",
            Self::NotImplemented => "The requested operation is not implemented.",
            Self::ServerError => {
                "The authorization server encountered an unexpected condition that prevented it from fulfilling the request."
            }
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownRequest | Self::NoApplicableHandler => ErrorCategory::Dispatch,
            Self::InvalidClient | Self::InvalidGrant | Self::RequestUnauthorized => {
                ErrorCategory::Authentication
            }
            Self::InvalidScope | Self::UnauthorizedClient | Self::AccessDenied => {
                ErrorCategory::Authorization
            }
            Self::TokenExpired | Self::TokenSignatureMismatch | Self::InactiveToken => {
                ErrorCategory::Token
            }
            Self::InvalidRequest | Self::UnsupportedGrantType | Self::UnsupportedResponseType => {
                ErrorCategory::Validation
            }
            Self::Conflict | Self::Storage => ErrorCategory::Infrastructure,
            Self::Signing | Self::NotImplemented | Self::ServerError => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An OAuth 2.0 protocol error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {description}")]
pub struct OAuthError {
    kind: ErrorKind,
    description: String,
    hint: Option<String>,
    debug: Option<String>,
}

macro_rules! kind_constructors {
    ($($(#[$meta:meta])* $name:ident => $kind:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[must_use]
            pub fn $name() -> Self {
                Self::new(ErrorKind::$kind)
            }
        )*
    };
}

impl OAuthError {
    /// Creates an error of the given kind with its default description.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            description: kind.default_description().to_string(),
            hint: None,
            debug: None,
        }
    }

    kind_constructors! {
        /// Creates an `unknown_request` error.
        unknown_request => UnknownRequest,
        /// Creates an `invalid_request` error.
        invalid_request => InvalidRequest,
        /// Creates an `invalid_client` error.
        invalid_client => InvalidClient,
        /// Creates an `invalid_grant` error.
        invalid_grant => InvalidGrant,
        /// Creates an `invalid_scope` error.
        invalid_scope => InvalidScope,
        /// Creates an `unauthorized_client` error.
        unauthorized_client => UnauthorizedClient,
        /// Creates an `unsupported_grant_type` error.
        unsupported_grant_type => UnsupportedGrantType,
        /// Creates an `unsupported_response_type` error.
        unsupported_response_type => UnsupportedResponseType,
        /// Creates an `access_denied` error.
        access_denied => AccessDenied,
        /// Creates a `request_unauthorized` error.
        request_unauthorized => RequestUnauthorized,
        /// Creates a token expired error.
        token_expired => TokenExpired,
        /// Creates a token signature mismatch error.
        token_signature_mismatch => TokenSignatureMismatch,
        /// Creates an inactive token error.
        inactive_token => InactiveToken,
        /// Creates a storage conflict error.
        conflict => Conflict,
        /// Creates a `no_applicable_handler` error.
        no_applicable_handler => NoApplicableHandler,
        /// Creates a `not_implemented` error.
        not_implemented => NotImplemented,
        /// Creates a `server_error`.
        server_error => ServerError,
    }

    /// Creates a storage failure carrying the backend's message as debug detail.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage).with_debug(message)
    }

    /// Creates a signing failure carrying the signer's message as debug detail.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Signing).with_debug(message)
    }

    /// Attaches a human-readable hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attaches a debug string. Only exposed to clients when debug messages are enabled.
    #[must_use]
    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }

    /// Replaces the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if this error is of the given kind.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Returns `true` if the handler signalled that it is not responsible.
    #[must_use]
    pub fn is_unknown_request(&self) -> bool {
        self.kind == ErrorKind::UnknownRequest
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the hint, if any.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Returns the debug string, if any.
    #[must_use]
    pub fn debug(&self) -> Option<&str> {
        self.debug.as_deref()
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        self.kind.code()
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Serialises the error for the wire.
    ///
    /// `expose_debug` controls whether the debug string is included at all.
    /// `legacy` selects the legacy shape, where hint and debug travel in
    /// separate `error_hint` / `error_debug` fields; otherwise they are merged
    /// into `error_description`.
    #[must_use]
    pub fn to_response(&self, expose_debug: bool, legacy: bool) -> ErrorResponse {
        let debug = if expose_debug { self.debug.clone() } else { None };

        if legacy {
            return ErrorResponse {
                error: self.kind.code().to_string(),
                error_description: self.description.clone(),
                error_hint: self.hint.clone(),
                error_debug: debug,
                status_code: Some(self.status_code()),
            };
        }

        let mut description = self.description.clone();
        if let Some(hint) = &self.hint {
            description.push(' ');
            description.push_str(hint);
        }
        if let Some(debug) = &debug {
            description.push(' ');
            description.push_str(debug);
        }

        ErrorResponse {
            error: self.kind.code().to_string(),
            error_description: description,
            error_hint: None,
            error_debug: None,
            status_code: None,
        }
    }
}

impl From<ErrorKind> for OAuthError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Wire representation of an [`OAuthError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    /// The error code.
    pub error: String,

    /// Human-readable description.
    pub error_description: String,

    /// Hint (legacy format only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_hint: Option<String>,

    /// Debug detail (legacy format only, and only when exposed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_debug: Option<String>,

    /// HTTP status code (legacy format only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Categories of OAuth errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification of clients or grants.
    Authentication,
    /// Permission checks (scopes, grant types).
    Authorization,
    /// Token validation.
    Token,
    /// Request validation.
    Validation,
    /// Storage backend.
    Infrastructure,
    /// Internal server errors.
    Internal,
    /// Handler dispatch.
    Dispatch,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
            Self::Dispatch => write!(f, "dispatch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OAuthError::invalid_scope();
        assert_eq!(
            err.to_string(),
            "invalid_scope: The requested scope is invalid, unknown, or malformed."
        );
    }

    #[test]
    fn test_hint_and_debug_are_kept_apart() {
        let err = OAuthError::invalid_grant()
            .with_hint("The client is public.")
            .with_debug("row 42");
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
        assert_eq!(err.hint(), Some("The client is public."));
        assert_eq!(err.debug(), Some("row 42"));
    }

    #[test]
    fn test_storage_error_carries_message_as_debug() {
        let err = OAuthError::storage("connection reset");
        assert!(err.is(ErrorKind::Storage));
        assert_eq!(err.debug(), Some("connection reset"));
        assert_eq!(err.oauth_error_code(), "server_error");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_debug_hidden_unless_exposed() {
        let err = OAuthError::storage("pq: duplicate key").with_hint("Try again.");

        let hidden = err.to_response(false, false);
        assert!(!hidden.error_description.contains("pq: duplicate key"));
        assert!(hidden.error_description.ends_with("Try again."));

        let exposed = err.to_response(true, false);
        assert!(exposed.error_description.contains("pq: duplicate key"));
    }

    #[test]
    fn test_legacy_format_splits_fields() {
        let err = OAuthError::invalid_scope()
            .with_hint("Scope 'admin' is not allowed.")
            .with_debug("matcher=exact");

        let legacy = err.to_response(true, true);
        assert_eq!(legacy.error, "invalid_scope");
        assert_eq!(
            legacy.error_hint.as_deref(),
            Some("Scope 'admin' is not allowed.")
        );
        assert_eq!(legacy.error_debug.as_deref(), Some("matcher=exact"));
        assert_eq!(legacy.status_code, Some(400));

        let json = serde_json::to_value(err.to_response(false, true)).unwrap();
        assert!(json.get("error_debug").is_none());
        assert_eq!(json["error_hint"], "Scope 'admin' is not allowed.");
    }

    #[test]
    fn test_format_does_not_change_classification() {
        let err = OAuthError::unauthorized_client();
        assert_eq!(err.to_response(false, true).error, "unauthorized_client");
        assert_eq!(err.to_response(false, false).error, "unauthorized_client");
    }

    #[test]
    fn test_no_applicable_handler_is_distinct() {
        let err = OAuthError::no_applicable_handler();
        assert_ne!(err.oauth_error_code(), OAuthError::invalid_grant().oauth_error_code());
        assert_eq!(err.category(), ErrorCategory::Dispatch);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(OAuthError::invalid_client().status_code(), 401);
        assert_eq!(OAuthError::access_denied().status_code(), 403);
        assert_eq!(OAuthError::not_implemented().status_code(), 501);
        assert_eq!(OAuthError::invalid_scope().status_code(), 400);
        assert!(OAuthError::invalid_scope().is_client_error());
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Authentication.to_string(), "authentication");
        assert_eq!(ErrorCategory::Dispatch.to_string(), "dispatch");
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
