//! Core identity and credential types.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a configured mail account.
///
/// Generated locally when the account is added; stable across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a new random account identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an account identifier from its string form.
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AccountId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// An OAuth token set for one account.
///
/// `expires_at` is the absolute expiry instant of the access token;
/// `None` means the provider issued a token without an expiry, which is
/// treated as never expiring. The refresh token is optional because some
/// flows (device grants without `offline_access`) never issue one.
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
    pub account_id: AccountId,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Create a token with no refresh token and no expiry.
    pub fn new(account_id: AccountId, access_token: impl Into<String>) -> Self {
        Self {
            account_id,
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Set an absolute expiry instant.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the expiry relative to now, as token endpoints report it.
    /// Spans outside the calendar range clamp to its limits.
    pub fn with_expires_in(self, seconds: i64) -> Self {
        let expires_at = ChronoDuration::try_seconds(seconds)
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(if seconds < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        self.with_expires_at(expires_at)
    }

    /// Whether the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_within(ChronoDuration::zero())
    }

    /// Whether the access token has expired or will expire within
    /// `margin`. Tokens without an expiry never expire.
    pub fn is_expired_within(&self, margin: ChronoDuration) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + margin >= expires_at,
            None => false,
        }
    }

    /// Whether this token is strictly fresher than `other`.
    ///
    /// A token without an expiry outlives any token with one. Between two
    /// expiring tokens the later expiry wins. Equal expiries are not
    /// fresher, so a caller comparing against its own token proceeds to
    /// refresh.
    pub fn is_fresher_than(&self, other: &Token) -> bool {
        match (self.expires_at, other.expires_at) {
            (None, Some(_)) => true,
            (Some(mine), Some(theirs)) => mine > theirs,
            (None, None) | (Some(_), None) => false,
        }
    }

    /// Time remaining until expiry, if the token expires and has not yet.
    pub fn time_until_expiry(&self) -> Option<ChronoDuration> {
        self.expires_at.and_then(|expires_at| {
            let remaining = expires_at - Utc::now();
            (remaining > ChronoDuration::zero()).then_some(remaining)
        })
    }
}

// Manual Debug so token material never lands in logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("account_id", &self.account_id)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_roundtrip() {
        let id = AccountId::new();
        let parsed = AccountId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_account_id_rejects_garbage() {
        assert!(AccountId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_token_builders() {
        let account_id = AccountId::new();
        let token = Token::new(account_id, "access")
            .with_refresh_token("refresh")
            .with_expires_in(3600);

        assert_eq!(token.account_id, account_id);
        assert_eq!(token.access_token, "access");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
        assert!(token.expires_at.is_some());
    }

    #[test]
    fn test_expiry_with_margin() {
        let token = Token::new(AccountId::new(), "access").with_expires_in(120);

        assert!(!token.is_expired());
        assert!(!token.is_expired_within(ChronoDuration::seconds(60)));
        assert!(token.is_expired_within(ChronoDuration::seconds(300)));
    }

    #[test]
    fn test_expires_in_clamps_out_of_range_spans() {
        let far = Token::new(AccountId::new(), "access").with_expires_in(i64::MAX);
        assert_eq!(far.expires_at, Some(DateTime::<Utc>::MAX_UTC));
        assert!(!far.is_expired());

        let past = Token::new(AccountId::new(), "access").with_expires_in(i64::MIN);
        assert_eq!(past.expires_at, Some(DateTime::<Utc>::MIN_UTC));
        assert!(past.is_expired());
    }

    #[test]
    fn test_token_without_expiry_never_expires() {
        let token = Token::new(AccountId::new(), "access");

        assert!(!token.is_expired());
        assert!(!token.is_expired_within(ChronoDuration::days(365)));
        assert!(token.time_until_expiry().is_none());
    }

    #[test]
    fn test_expired_token() {
        let token =
            Token::new(AccountId::new(), "access").with_expires_at(Utc::now() - ChronoDuration::seconds(60));

        assert!(token.is_expired());
        assert!(token.time_until_expiry().is_none());
    }

    #[test]
    fn test_freshness_no_expiry_beats_expiring() {
        let account_id = AccountId::new();
        let unlimited = Token::new(account_id, "a");
        let expiring = Token::new(account_id, "b").with_expires_in(3600);

        assert!(unlimited.is_fresher_than(&expiring));
        assert!(!expiring.is_fresher_than(&unlimited));
    }

    #[test]
    fn test_freshness_later_expiry_wins() {
        let account_id = AccountId::new();
        let sooner = Token::new(account_id, "a").with_expires_in(600);
        let later = Token::new(account_id, "b").with_expires_in(3600);

        assert!(later.is_fresher_than(&sooner));
        assert!(!sooner.is_fresher_than(&later));
    }

    #[test]
    fn test_freshness_equal_expiries_not_fresher() {
        let account_id = AccountId::new();
        let expires_at = Utc::now() + ChronoDuration::seconds(900);
        let a = Token::new(account_id, "a").with_expires_at(expires_at);
        let b = Token::new(account_id, "b").with_expires_at(expires_at);

        assert!(!a.is_fresher_than(&b));
        assert!(!b.is_fresher_than(&a));
    }

    #[test]
    fn test_freshness_neither_expires() {
        let account_id = AccountId::new();
        let a = Token::new(account_id, "a");
        let b = Token::new(account_id, "b");

        assert!(!a.is_fresher_than(&b));
    }

    #[test]
    fn test_debug_redacts_token_material() {
        let token = Token::new(AccountId::new(), "super-secret").with_refresh_token("also-secret");
        let debug = format!("{:?}", token);

        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("also-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
