//! Response records produced by the handlers.

use serde_json::{Map, Value};
use time::Duration;

use super::{AccessRequest, Arguments, Form, TokenKind};
use crate::handler::TokenUse;

/// A token endpoint response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessResponse {
    access_token: String,
    token_type: String,
    expires_in: Option<Duration>,
    scopes: Arguments,
    extra: Map<String, Value>,
}

impl AccessResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the access token.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    /// Returns the access token. Empty until a handler sets it.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Sets the token type.
    pub fn set_token_type(&mut self, token_type: impl Into<String>) {
        self.token_type = token_type.into();
    }

    /// Returns the token type.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Sets the remaining lifetime. May be negative.
    pub fn set_expires_in(&mut self, expires_in: Duration) {
        self.expires_in = Some(expires_in);
    }

    /// Returns the remaining lifetime.
    #[must_use]
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    /// Sets the granted scopes.
    pub fn set_scopes(&mut self, scopes: Arguments) {
        self.scopes = scopes;
    }

    /// Returns the granted scopes.
    #[must_use]
    pub fn scopes(&self) -> &Arguments {
        &self.scopes
    }

    /// Sets an additional top-level field (`refresh_token`, `id_token`, ...).
    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }

    /// Returns an additional field.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Builds the JSON body.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut body = self.extra.clone();
        body.insert("access_token".into(), self.access_token.clone().into());
        body.insert("token_type".into(), self.token_type.clone().into());
        if let Some(expires_in) = self.expires_in {
            body.insert("expires_in".into(), expires_in.whole_seconds().into());
        }
        if !self.scopes.is_empty() {
            body.insert("scope".into(), self.scopes.to_space_delimited().into());
        }
        Value::Object(body)
    }
}

/// An authorization endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeResponse {
    parameters: Form,
    headers: Vec<(String, String)>,
}

impl AuthorizeResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a response parameter (`code`, `state`, `id_token`, ...).
    pub fn add_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.set(key, value);
    }

    /// Returns the response parameters.
    #[must_use]
    pub fn parameters(&self) -> &Form {
        &self.parameters
    }

    /// Returns a single parameter.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }

    /// Adds an HTTP header to send with the response.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Returns the extra HTTP headers.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// Result of an introspection request (RFC 7662).
#[derive(Debug, Clone, Default)]
pub struct IntrospectionResponse {
    /// Whether the token is active.
    pub active: bool,

    /// The request the token was issued for. Only set when active.
    pub access_request: Option<AccessRequest>,

    /// Which kind of token was introspected.
    pub token_use: Option<TokenUse>,
}

impl IntrospectionResponse {
    /// An inactive result.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Builds the JSON body. Inactive tokens only report `active: false`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let (true, Some(ar)) = (self.active, &self.access_request) else {
            return serde_json::json!({ "active": false });
        };
        let request = &ar.request;

        let mut body = Map::new();
        body.insert("active".into(), true.into());
        body.insert("client_id".into(), request.client.id.clone().into());
        if !request.granted_scopes.is_empty() {
            body.insert(
                "scope".into(),
                request.granted_scopes.to_space_delimited().into(),
            );
        }
        if !request.granted_audience.is_empty() {
            body.insert("aud".into(), request.granted_audience.as_slice().into());
        }
        if !request.session.subject.is_empty() {
            body.insert("sub".into(), request.session.subject.clone().into());
        }
        if !request.session.username.is_empty() {
            body.insert("username".into(), request.session.username.clone().into());
        }
        body.insert("iat".into(), request.requested_at.unix_timestamp().into());

        let kind = match self.token_use {
            Some(TokenUse::RefreshToken) => TokenKind::RefreshToken,
            _ => TokenKind::AccessToken,
        };
        if let Some(exp) = request.session.expires_at(kind) {
            body.insert("exp".into(), exp.unix_timestamp().into());
        }
        if let Some(token_use) = self.token_use {
            body.insert("token_use".into(), token_use.as_str().into());
        }
        Value::Object(body)
    }
}
