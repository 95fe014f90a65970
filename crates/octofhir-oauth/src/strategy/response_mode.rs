//! Authorization endpoint response writing.
//!
//! Successful responses and errors are delivered to the client's redirect
//! URI in the query, in the fragment, or as an auto-submitting HTML form
//! (`form_post`). Errors raised before a redirect URI was validated are
//! written as JSON instead.
//!
//! Every response carries `Cache-Control: no-store` and `Pragma: no-cache`.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode, header};
use url::Url;

use crate::OAuthError;
use crate::types::{AuthorizeRequest, AuthorizeResponse, Form, HttpResponse, ResponseMode};

/// Page used for `form_post` unless overridden.
pub const DEFAULT_FORM_POST_TEMPLATE: &str = r#"<html>
<head><title>Submit This Form</title></head>
<body onload="javascript:document.forms[0].submit()">
<form method="post" action="{redirect_uri}">
{form_fields}
</form>
</body>
</html>"#;

/// Writes authorization responses for a set of response modes.
pub trait ResponseModeHandler: Send + Sync {
    /// Response modes this handler writes. The provider only routes requests
    /// whose effective mode is listed here.
    fn response_modes(&self) -> &[ResponseMode];

    /// Writes a successful authorization response.
    fn write_authorize_response(
        &self,
        request: &AuthorizeRequest,
        response: &AuthorizeResponse,
    ) -> HttpResponse;

    /// Writes an authorization error.
    fn write_authorize_error(&self, request: &AuthorizeRequest, error: &OAuthError)
    -> HttpResponse;
}

/// Writes `query`, `fragment` and `form_post` responses.
#[derive(Debug, Clone)]
pub struct DefaultResponseModeHandler {
    form_post_template: String,
    expose_debug: bool,
    legacy_errors: bool,
}

impl Default for DefaultResponseModeHandler {
    fn default() -> Self {
        Self {
            form_post_template: DEFAULT_FORM_POST_TEMPLATE.to_string(),
            expose_debug: false,
            legacy_errors: false,
        }
    }
}

impl DefaultResponseModeHandler {
    /// Creates a handler with the default template and error format.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the `form_post` page.
    ///
    /// `{redirect_uri}` and `{form_fields}` are substituted.
    #[must_use]
    pub fn with_form_post_template(mut self, template: impl Into<String>) -> Self {
        self.form_post_template = template.into();
        self
    }

    /// Sets how errors are serialised.
    #[must_use]
    pub fn with_error_format(mut self, expose_debug: bool, legacy: bool) -> Self {
        self.expose_debug = expose_debug;
        self.legacy_errors = legacy;
        self
    }

    fn error_parameters(&self, request: &AuthorizeRequest, error: &OAuthError) -> Form {
        let wire = error.to_response(self.expose_debug, self.legacy_errors);
        let mut params = Form::new();
        params.set("error", wire.error);
        params.set("error_description", wire.error_description);
        if let Some(hint) = wire.error_hint {
            params.set("error_hint", hint);
        }
        if let Some(debug) = wire.error_debug {
            params.set("error_debug", debug);
        }
        if let Some(state) = &request.state {
            params.set("state", state.clone());
        }
        params
    }

    fn write(
        &self,
        redirect_uri: &Url,
        mode: ResponseMode,
        params: &Form,
        extra_headers: &[(String, String)],
    ) -> HttpResponse {
        let mut response = match mode {
            ResponseMode::FormPost => {
                let page = self
                    .form_post_template
                    .replace("{redirect_uri}", &html_escape(redirect_uri.as_str()))
                    .replace("{form_fields}", &hidden_fields(params));
                build(
                    StatusCode::OK,
                    &[(header::CONTENT_TYPE, "text/html;charset=UTF-8")],
                    Body::from(page),
                )
            }
            ResponseMode::Fragment => {
                let mut target = redirect_uri.clone();
                target.set_fragment(Some(&params.encode()));
                redirect(&target)
            }
            ResponseMode::Query | ResponseMode::Default => {
                let mut target = redirect_uri.clone();
                {
                    let mut pairs = target.query_pairs_mut();
                    for (key, values) in params.iter() {
                        for value in values {
                            pairs.append_pair(key, value);
                        }
                    }
                }
                redirect(&target)
            }
        };

        for (name, value) in extra_headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                response.headers_mut().append(name, value);
            }
        }
        response
    }
}

impl ResponseModeHandler for DefaultResponseModeHandler {
    fn response_modes(&self) -> &[ResponseMode] {
        &[
            ResponseMode::Default,
            ResponseMode::Query,
            ResponseMode::Fragment,
            ResponseMode::FormPost,
        ]
    }

    fn write_authorize_response(
        &self,
        request: &AuthorizeRequest,
        response: &AuthorizeResponse,
    ) -> HttpResponse {
        let Some(redirect_uri) = &request.redirect_uri else {
            tracing::warn!(
                request_id = %request.request.id,
                "Authorize response without redirect URI"
            );
            return write_json_error(
                &OAuthError::invalid_request()
                    .with_hint("The 'redirect_uri' parameter is missing or was not validated."),
                self.expose_debug,
                self.legacy_errors,
            );
        };

        self.write(
            redirect_uri,
            request.effective_response_mode(),
            response.parameters(),
            response.headers(),
        )
    }

    fn write_authorize_error(
        &self,
        request: &AuthorizeRequest,
        error: &OAuthError,
    ) -> HttpResponse {
        let Some(redirect_uri) = &request.redirect_uri else {
            return write_json_error(error, self.expose_debug, self.legacy_errors);
        };

        let params = self.error_parameters(request, error);
        self.write(redirect_uri, request.effective_response_mode(), &params, &[])
    }
}

/// Writes an error as a JSON document with the error's status code.
#[must_use]
pub fn write_json_error(error: &OAuthError, expose_debug: bool, legacy: bool) -> HttpResponse {
    let body = serde_json::to_vec(&error.to_response(expose_debug, legacy))
        .unwrap_or_else(|_| br#"{"error":"server_error"}"#.to_vec());
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    build(
        status,
        &[(header::CONTENT_TYPE, "application/json;charset=UTF-8")],
        Body::from(body),
    )
}

/// Writes a JSON value with status 200.
#[must_use]
pub fn write_json(value: &serde_json::Value) -> HttpResponse {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
    build(
        StatusCode::OK,
        &[(header::CONTENT_TYPE, "application/json;charset=UTF-8")],
        Body::from(body),
    )
}

fn redirect(target: &Url) -> HttpResponse {
    let mut response = build(StatusCode::SEE_OTHER, &[], Body::empty());
    match HeaderValue::from_str(target.as_str()) {
        Ok(location) => {
            response.headers_mut().insert(header::LOCATION, location);
            response
        }
        Err(_) => build(StatusCode::INTERNAL_SERVER_ERROR, &[], Body::empty()),
    }
}

fn build(status: StatusCode, headers: &[(HeaderName, &'static str)], body: Body) -> HttpResponse {
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let h = response.headers_mut();
    h.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    h.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    for (name, value) in headers {
        h.insert(name.clone(), HeaderValue::from_static(value));
    }
    response
}

fn hidden_fields(params: &Form) -> String {
    params
        .iter()
        .flat_map(|(key, values)| {
            values.iter().map(move |value| {
                format!(
                    r#"<input type="hidden" name="{}" value="{}"/>"#,
                    html_escape(key),
                    html_escape(value)
                )
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
