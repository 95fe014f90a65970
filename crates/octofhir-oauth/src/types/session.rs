//! Per-request session state carried alongside issued tokens.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::token::jwt::IdTokenClaims;

/// The kinds of credential the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Bearer access token.
    AccessToken,
    /// Refresh token.
    RefreshToken,
    /// Authorization code.
    AuthorizeCode,
    /// OpenID Connect ID token.
    IdToken,
}

impl TokenKind {
    /// Returns the snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::AuthorizeCode => "authorize_code",
            Self::IdToken => "id_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session data attached to a request and persisted with its tokens.
///
/// Expiry instants are unset until a handler assigns them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    expires_at: HashMap<TokenKind, OffsetDateTime>,

    /// Resource owner identifier. Empty for client-only grants.
    #[serde(default)]
    pub subject: String,

    /// Resource owner display name.
    #[serde(default)]
    pub username: String,

    /// Claims for ID tokens. Required by OpenID Connect handlers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_claims: Option<IdTokenClaims>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session for a resource owner, with ID token claims seeded from the subject.
    #[must_use]
    pub fn for_subject(subject: impl Into<String>) -> Self {
        let subject = subject.into();
        Self {
            id_token_claims: Some(IdTokenClaims::new(subject.clone())),
            subject,
            ..Default::default()
        }
    }

    /// Sets the expiry instant for a token kind.
    pub fn set_expires_at(&mut self, kind: TokenKind, at: OffsetDateTime) {
        self.expires_at.insert(kind, at);
    }

    /// Returns the expiry instant for a token kind, if one was assigned.
    #[must_use]
    pub fn expires_at(&self, kind: TokenKind) -> Option<OffsetDateTime> {
        self.expires_at.get(&kind).copied()
    }

    /// Returns `true` if an expiry is set for the kind and lies before `now`.
    #[must_use]
    pub fn is_expired(&self, kind: TokenKind, now: OffsetDateTime) -> bool {
        self.expires_at(kind).is_some_and(|at| at < now)
    }

    /// Records the `at_hash` claim for the next ID token.
    pub fn set_access_token_hash(&mut self, hash: impl Into<String>) {
        if let Some(claims) = self.id_token_claims.as_mut() {
            claims.at_hash = Some(hash.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_expiry_defaults_to_unset() {
        let session = Session::new();
        assert_eq!(session.expires_at(TokenKind::AccessToken), None);
        assert!(!session.is_expired(TokenKind::AccessToken, OffsetDateTime::now_utc()));
    }

    #[test]
    fn test_expiry_per_kind() {
        let now = OffsetDateTime::now_utc();
        let mut session = Session::new();
        session.set_expires_at(TokenKind::AccessToken, now - Duration::seconds(1));
        session.set_expires_at(TokenKind::RefreshToken, now + Duration::hours(1));

        assert!(session.is_expired(TokenKind::AccessToken, now));
        assert!(!session.is_expired(TokenKind::RefreshToken, now));
        assert_eq!(session.expires_at(TokenKind::AuthorizeCode), None);
    }

    #[test]
    fn test_for_subject_seeds_claims() {
        let mut session = Session::for_subject("alice");
        assert_eq!(session.subject, "alice");
        assert_eq!(session.id_token_claims.as_ref().unwrap().sub, "alice");

        session.set_access_token_hash("abc");
        assert_eq!(
            session.id_token_claims.unwrap().at_hash.as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_session_json_roundtrip_keeps_expiry() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let mut session = Session::for_subject("bob");
        session.set_expires_at(TokenKind::IdToken, at);

        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
