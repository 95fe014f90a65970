//! End-to-end flows through a composed provider.
//!
//! These tests drive the provider the way a host server would: build an
//! [`HttpRequest`], pass it to the endpoint operation, then write the
//! response.

use std::sync::Arc;

use axum::http::{StatusCode, header};
use octofhir_oauth::prelude::*;
use octofhir_oauth::strategy::Argon2Hasher;
use url::Url;

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
const OLD_SECRET: &[u8] = b"fedcba9876543210fedcba9876543210";

/// Helper to hash a secret cheaply for tests.
fn hash(secret: &str) -> String {
    Argon2Hasher::with_params(8, 1, 1)
        .unwrap()
        .hash(secret.as_bytes())
        .unwrap()
}

fn service_client() -> Client {
    Client::confidential("service", hash("service-secret"))
        .with_grant_types(["client_credentials"])
        .with_scopes(["read", "write"])
        .with_audience(["https://api.example.com"])
}

fn web_client() -> Client {
    Client::confidential("web", hash("web-secret"))
        .with_grant_types(["authorization_code", "refresh_token"])
        .with_response_types(["code", "id_token"])
        .with_scopes(["openid", "offline", "profile"])
        .with_redirect_uris(["https://app.example.com/callback"])
}

fn provider_with(config: ProviderConfig, secret: &[u8]) -> (Provider, Arc<MemoryStore>) {
    let store = Arc::new(
        MemoryStore::new()
            .with_client(service_client())
            .with_client(web_client()),
    );
    let provider = compose_all_enabled(
        &config,
        store.clone(),
        secret,
        SigningKeyPair::generate_ec().unwrap(),
    )
    .unwrap();
    (provider, store)
}

fn provider() -> (Provider, Arc<MemoryStore>) {
    provider_with(ProviderConfig::default(), SECRET)
}

fn form(pairs: &[(&str, &str)]) -> Form {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

async fn client_credentials_token(provider: &Provider, scope: &str) -> AccessResponse {
    let request = HttpRequest::post(form(&[
        ("grant_type", "client_credentials"),
        ("scope", scope),
    ]))
    .with_basic_auth("service", "service-secret");

    let access_request = provider
        .new_access_request(&request, Session::new())
        .await
        .unwrap();
    provider.new_access_response(&access_request).await.unwrap()
}

async fn body_json(response: HttpResponse) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Client Credentials
// =============================================================================

#[tokio::test]
async fn test_client_credentials_issues_bearer_token() {
    let (provider, store) = provider();

    let response = client_credentials_token(&provider, "read").await;
    assert_eq!(response.token_type(), "bearer");
    assert!(!response.access_token().is_empty());
    assert!(response.scopes().has("read"));
    assert_eq!(store.access_token_count(), 1);

    let http = provider.write_access_response(&response);
    assert_eq!(http.status(), StatusCode::OK);
    assert_eq!(http.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(http.headers()[header::PRAGMA], "no-cache");

    let body = body_json(http).await;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["scope"], "read");
    assert!(body["expires_in"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_client_credentials_rejects_wrong_secret() {
    let (provider, _) = provider();
    let request = HttpRequest::post(form(&[("grant_type", "client_credentials")]))
        .with_basic_auth("service", "wrong");

    let err = provider
        .new_access_request(&request, Session::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidClient);

    let http = provider.write_access_error(&request, &err);
    assert_eq!(http.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(http).await;
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn test_client_credentials_rejects_unknown_scope() {
    let (provider, _) = provider();
    let request = HttpRequest::post(form(&[
        ("grant_type", "client_credentials"),
        ("scope", "admin"),
    ]))
    .with_basic_auth("service", "service-secret");

    let err = provider
        .new_access_request(&request, Session::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidScope);
}

#[tokio::test]
async fn test_unknown_grant_type_is_unsupported() {
    let (provider, _) = provider();
    let request = HttpRequest::post(form(&[("grant_type", "password")]))
        .with_basic_auth("service", "service-secret");

    let err = provider
        .new_access_request(&request, Session::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedGrantType);
}

// =============================================================================
// Introspection and Revocation
// =============================================================================

#[tokio::test]
async fn test_introspection_with_client_auth() {
    let (provider, _) = provider();
    let token = client_credentials_token(&provider, "read write").await;

    let request = HttpRequest::post(form(&[
        ("token", token.access_token()),
        ("scope", "read"),
    ]))
    .with_basic_auth("service", "service-secret");
    let response = provider
        .new_introspection_request(&request, Session::new())
        .await
        .unwrap();
    assert!(response.active);
    assert_eq!(response.token_use, Some(TokenUse::AccessToken));

    let body = body_json(provider.write_introspection_response(&response)).await;
    assert_eq!(body["active"], true);
    assert_eq!(body["client_id"], "service");
    assert_eq!(body["token_use"], "access_token");
}

#[tokio::test]
async fn test_introspection_with_bearer_auth() {
    let (provider, _) = provider();
    let caller = client_credentials_token(&provider, "read").await;
    let target = client_credentials_token(&provider, "write").await;

    let request = HttpRequest::post(form(&[("token", target.access_token())])).with_header(
        "authorization",
        &format!("Bearer {}", caller.access_token()),
    );
    let response = provider
        .new_introspection_request(&request, Session::new())
        .await
        .unwrap();
    assert!(response.active);
}

#[tokio::test]
async fn test_introspection_of_garbage_is_inactive() {
    let (provider, _) = provider();
    let request = HttpRequest::post(form(&[("token", "not-a-token")]))
        .with_basic_auth("service", "service-secret");

    let response = provider
        .new_introspection_request(&request, Session::new())
        .await
        .unwrap();
    assert!(!response.active);
    assert_eq!(
        response.to_json(),
        serde_json::json!({ "active": false })
    );
}

#[tokio::test]
async fn test_revoked_token_is_inactive() {
    let (provider, _) = provider();
    let token = client_credentials_token(&provider, "read").await;

    let revoke = HttpRequest::post(form(&[
        ("token", token.access_token()),
        ("token_type_hint", "access_token"),
    ]))
    .with_basic_auth("service", "service-secret");
    let result = provider.new_revocation_request(&revoke).await;
    assert!(result.is_ok());
    assert_eq!(
        provider.write_revocation_response(&revoke, &result).status(),
        StatusCode::OK
    );

    let err = provider
        .introspect_token(
            token.access_token(),
            TokenUse::AccessToken,
            Session::new(),
            &[],
        )
        .await
        .unwrap_err();
    assert!(!err.is_unknown_request());
}

// =============================================================================
// Authorization Code + OpenID Connect
// =============================================================================

fn authorize_request(scopes: &[&str]) -> AuthorizeRequest {
    let mut inner = Request::new(web_client());
    inner.requested_scopes = scopes.iter().copied().collect();
    for scope in scopes {
        inner.grant_scope(*scope);
    }
    inner.form = form(&[
        ("redirect_uri", "https://app.example.com/callback"),
        ("nonce", "a-sufficiently-long-nonce"),
    ]);

    let mut request = AuthorizeRequest::new(inner);
    request.response_types = ["code"].into_iter().collect();
    request.redirect_uri = Some(Url::parse("https://app.example.com/callback").unwrap());
    request.state = Some("state-with-entropy".to_string());
    request
}

#[tokio::test]
async fn test_authorization_code_flow_with_id_token() {
    let (provider, store) = provider();

    let mut authorize = authorize_request(&["openid", "offline"]);
    let response = provider
        .new_authorize_response(&mut authorize, Session::for_subject("alice"))
        .await
        .unwrap();
    let code = response.parameter("code").unwrap().to_string();
    assert_eq!(response.parameter("state"), Some("state-with-entropy"));

    let redirect = provider.write_authorize_response(&authorize, &response);
    assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
    let location = redirect.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://app.example.com/callback?"));
    assert!(location.contains("code="));

    let exchange = HttpRequest::post(form(&[
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", "https://app.example.com/callback"),
    ]))
    .with_basic_auth("web", "web-secret");
    let access_request = provider
        .new_access_request(&exchange, Session::new())
        .await
        .unwrap();
    let tokens = provider.new_access_response(&access_request).await.unwrap();

    assert!(!tokens.access_token().is_empty());
    assert!(tokens.extra("refresh_token").is_some());
    let id_token = tokens.extra("id_token").and_then(|v| v.as_str()).unwrap();
    assert_eq!(id_token.split('.').count(), 3);
    assert_eq!(store.refresh_token_count(), 1);

    // Codes are single use.
    let err = provider
        .new_access_request(&exchange, Session::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidGrant);
}

#[tokio::test]
async fn test_refresh_token_rotation() {
    let (provider, _) = provider();

    let mut authorize = authorize_request(&["offline"]);
    let response = provider
        .new_authorize_response(&mut authorize, Session::for_subject("alice"))
        .await
        .unwrap();
    let exchange = HttpRequest::post(form(&[
        ("grant_type", "authorization_code"),
        ("code", response.parameter("code").unwrap()),
        ("redirect_uri", "https://app.example.com/callback"),
    ]))
    .with_basic_auth("web", "web-secret");
    let access_request = provider
        .new_access_request(&exchange, Session::new())
        .await
        .unwrap();
    let tokens = provider.new_access_response(&access_request).await.unwrap();
    let refresh_token = tokens
        .extra("refresh_token")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();

    let refresh = HttpRequest::post(form(&[
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token.as_str()),
    ]))
    .with_basic_auth("web", "web-secret");
    let access_request = provider
        .new_access_request(&refresh, Session::new())
        .await
        .unwrap();
    let refreshed = provider.new_access_response(&access_request).await.unwrap();
    assert_ne!(refreshed.access_token(), tokens.access_token());
    assert!(refreshed.extra("refresh_token").is_some());

    // The old access token was revoked together with the old refresh token.
    assert!(
        provider
            .introspect_token(
                tokens.access_token(),
                TokenUse::AccessToken,
                Session::new(),
                &[],
            )
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_authorize_error_redirects_to_client() {
    let (provider, _) = provider();

    let mut authorize = authorize_request(&["admin"]);
    let err = provider
        .new_authorize_response(&mut authorize, Session::for_subject("alice"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidScope);

    let redirect = provider.write_authorize_error(&authorize, &err);
    assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
    let location = redirect.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("error=invalid_scope"));
    assert!(location.contains("state=state-with-entropy"));
}

#[tokio::test]
async fn test_unclaimed_response_type() {
    let (provider, _) = provider();

    let mut authorize = authorize_request(&["openid"]);
    authorize.response_types = ["token"].into_iter().collect();
    let err = provider
        .new_authorize_response(&mut authorize, Session::for_subject("alice"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoApplicableHandler);
}

// =============================================================================
// Secret Rotation
// =============================================================================

#[tokio::test]
async fn test_tokens_survive_secret_rotation() {
    let store = Arc::new(MemoryStore::new().with_client(service_client()));
    let before = compose_all_enabled(
        &ProviderConfig::default(),
        store.clone(),
        OLD_SECRET,
        SigningKeyPair::generate_ec().unwrap(),
    )
    .unwrap();
    let token = client_credentials_token(&before, "read").await;

    let rotated = ProviderConfig {
        rotated_global_secrets: vec![String::from_utf8(OLD_SECRET.to_vec()).unwrap()],
        ..Default::default()
    };
    let after = compose_all_enabled(
        &rotated,
        store.clone(),
        SECRET,
        SigningKeyPair::generate_ec().unwrap(),
    )
    .unwrap();
    let (token_use, request) = after
        .introspect_token(token.access_token(), TokenUse::AccessToken, Session::new(), &[])
        .await
        .unwrap();
    assert_eq!(token_use, TokenUse::AccessToken);
    assert_eq!(request.request.client.id, "service");

    // Without the rotated secret the old token no longer verifies.
    let (unrotated, _) = provider_with(ProviderConfig::default(), SECRET);
    assert!(
        unrotated
            .introspect_token(token.access_token(), TokenUse::AccessToken, Session::new(), &[])
            .await
            .is_err()
    );
}
