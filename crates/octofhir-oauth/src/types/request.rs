//! Request records flowing through the handlers.
//!
//! [`Request`] is the common core; [`AccessRequest`] adds token-endpoint
//! state and [`AuthorizeRequest`] adds authorization-endpoint state. Stored
//! token sessions are sanitized copies of a [`Request`].

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use super::{Arguments, Client, Form, Session};

/// Core request record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request identifier. Tokens issued for one grant share it.
    pub id: String,

    /// When the request was received.
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,

    /// The requesting client.
    pub client: Client,

    /// Scopes the client asked for.
    pub requested_scopes: Arguments,

    /// Scopes granted so far.
    pub granted_scopes: Arguments,

    /// Audiences the client asked for.
    pub requested_audience: Arguments,

    /// Audiences granted so far.
    pub granted_audience: Arguments,

    /// Raw form parameters.
    pub form: Form,

    /// Session data.
    pub session: Session,
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Client::default())
    }
}

impl Request {
    /// Creates a request for a client with a fresh identifier.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            requested_at: OffsetDateTime::now_utc(),
            client,
            requested_scopes: Arguments::new(),
            granted_scopes: Arguments::new(),
            requested_audience: Arguments::new(),
            granted_audience: Arguments::new(),
            form: Form::new(),
            session: Session::new(),
        }
    }

    /// Sets the session.
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Marks a scope as granted.
    pub fn grant_scope(&mut self, scope: impl Into<String>) {
        self.granted_scopes.append(scope);
    }

    /// Marks an audience as granted.
    pub fn grant_audience(&mut self, audience: impl Into<String>) {
        self.granted_audience.append(audience);
    }

    /// Returns a copy with the named form parameters removed.
    ///
    /// Everything outside the form is copied unchanged, so the copy can be
    /// persisted without leaking credentials passed as parameters.
    #[must_use]
    pub fn sanitize<S: AsRef<str>>(&self, redacted: &[S]) -> Self {
        let mut copy = self.clone();
        for key in redacted {
            copy.form.remove(key.as_ref());
        }
        copy
    }
}

// =============================================================================
// Access Request
// =============================================================================

/// A token endpoint request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessRequest {
    /// The core request.
    pub request: Request,

    /// Grant types named by `grant_type`.
    pub grant_types: Arguments,

    /// Grant types a handler has processed.
    pub handled_grant_types: Arguments,
}

impl AccessRequest {
    /// Wraps a core request.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            grant_types: Arguments::new(),
            handled_grant_types: Arguments::new(),
        }
    }

    /// Sets the grant types.
    #[must_use]
    pub fn with_grant_types<I, S>(mut self, grant_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grant_types = grant_types.into_iter().collect();
        self
    }
}

// =============================================================================
// Authorize Request
// =============================================================================

/// How an authorization response is delivered to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Not requested; the flow's default applies.
    #[default]
    Default,
    /// Parameters in the redirect URI query.
    Query,
    /// Parameters in the redirect URI fragment.
    Fragment,
    /// Auto-submitting HTML form.
    FormPost,
}

impl ResponseMode {
    /// Parses a `response_mode` parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "query" => Some(Self::Query),
            "fragment" => Some(Self::Fragment),
            "form_post" => Some(Self::FormPost),
            _ => None,
        }
    }

    /// Returns the parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Query => "query",
            Self::Fragment => "fragment",
            Self::FormPost => "form_post",
        }
    }
}

/// An authorization endpoint request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    /// The core request.
    pub request: Request,

    /// Response types named by `response_type`.
    pub response_types: Arguments,

    /// Response types a handler has processed.
    pub handled_response_types: Arguments,

    /// Validated redirect URI.
    pub redirect_uri: Option<Url>,

    /// Opaque client state echoed back in the response.
    pub state: Option<String>,

    /// Requested response mode.
    pub response_mode: ResponseMode,

    /// Mode used when none is requested. Handlers set this for their flow.
    pub default_response_mode: ResponseMode,
}

impl AuthorizeRequest {
    /// Wraps a core request.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            default_response_mode: ResponseMode::Query,
            ..Default::default()
        }
    }

    /// Marks a response type as handled.
    pub fn set_response_type_handled(&mut self, response_type: &str) {
        self.handled_response_types.append(response_type);
    }

    /// Returns `true` once every requested response type was handled.
    #[must_use]
    pub fn did_handle_all_response_types(&self) -> bool {
        self.response_types
            .iter()
            .all(|rt| self.handled_response_types.has(rt))
    }

    /// The response mode that will actually be used.
    #[must_use]
    pub fn effective_response_mode(&self) -> ResponseMode {
        match self.response_mode {
            ResponseMode::Default => match self.default_response_mode {
                ResponseMode::Default => ResponseMode::Query,
                mode => mode,
            },
            mode => mode,
        }
    }
}
