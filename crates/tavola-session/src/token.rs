//! Bearer token claim inspection.
//!
//! # Design
//! - Signatures are never verified; the backend remains the authority. Claims
//!   are read only to decide whether a stored token is worth sending.
//! - Every malformed input collapses to `None` instead of an error so callers
//!   can treat "unreadable" and "expired" the same way.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

const BEARER_PREFIX: &str = "Bearer ";
const SUBJECT_FIELDS: [&str; 4] = ["sub", "user_id", "userId", "id"];

/// Claims read from a token payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenClaims {
    /// Expiry in milliseconds since the epoch; `None` when `exp` is missing.
    pub expires_at_ms: Option<i64>,
    /// Subject identifier, taken from the first of `sub`, `user_id`, `userId`, `id`.
    pub subject: Option<String>,
}

impl TokenClaims {
    /// Whether the claims fail to prove the token is still valid at `now_ms`.
    #[must_use]
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_none_or(|expiry| now_ms >= expiry)
    }

    /// Milliseconds left before expiry, floored at zero.
    #[must_use]
    pub fn remaining_at(&self, now_ms: i64) -> u64 {
        self.expires_at_ms
            .map(|expiry| expiry.saturating_sub(now_ms))
            .and_then(|left| u64::try_from(left).ok())
            .unwrap_or(0)
    }
}

/// The bare token, without surrounding whitespace or a `Bearer ` prefix.
#[must_use]
pub fn strip_bearer(token: &str) -> &str {
    let raw = token.trim();
    raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw).trim()
}

/// Decode the claims of a (possibly `Bearer `-prefixed) token.
#[must_use]
pub fn decode(token: &str) -> Option<TokenClaims> {
    let raw = strip_bearer(token);

    let mut segments = raw.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let Value::Object(claims) = serde_json::from_slice::<Value>(&bytes).ok()? else {
        return None;
    };

    Some(TokenClaims {
        expires_at_ms: expiry_ms(&claims),
        subject: subject(&claims),
    })
}

/// Whether the token is unreadable, lacks an expiry, or has expired at `now_ms`.
#[must_use]
pub fn is_expired(token: &str, now_ms: i64) -> bool {
    decode(token).is_none_or(|claims| claims.is_expired_at(now_ms))
}

/// Milliseconds until the token expires; zero when unreadable or expired.
#[must_use]
pub fn remaining_millis(token: &str, now_ms: i64) -> u64 {
    decode(token).map_or(0, |claims| claims.remaining_at(now_ms))
}

/// Build an unsigned token carrying `claims`, for fixtures and offline tooling.
#[must_use]
pub fn encode_unsigned(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.unsigned")
}

fn expiry_ms(claims: &Map<String, Value>) -> Option<i64> {
    let exp = claims.get("exp")?;
    let seconds = exp.as_i64().or_else(|| {
        exp.as_f64()
            .filter(|value| value.is_finite())
            .map(|value| value.trunc() as i64)
    })?;
    Some(seconds.saturating_mul(1_000))
}

fn subject(claims: &Map<String, Value>) -> Option<String> {
    SUBJECT_FIELDS
        .iter()
        .filter_map(|field| claims.get(*field))
        .find_map(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn token_with(claims: &Value) -> String {
        encode_unsigned(claims)
    }

    #[test]
    fn decode_rejects_wrong_segment_counts() {
        for input in ["", "abc", "a.b", "a.b.c.d", "....", "Bearer a.b"] {
            assert!(decode(input).is_none(), "expected none for {input:?}");
        }
    }

    #[test]
    fn decode_rejects_bad_base64_and_bad_json() {
        assert!(decode("h.!!!not-base64!!!.s").is_none());
        let not_json = URL_SAFE_NO_PAD.encode("not json");
        assert!(decode(&format!("h.{not_json}.s")).is_none());
        let array = URL_SAFE_NO_PAD.encode("[1,2]");
        assert!(decode(&format!("h.{array}.s")).is_none());
        let padded = format!("h.{}=.s", URL_SAFE_NO_PAD.encode("{}"));
        assert!(decode(&padded).is_none());
    }

    #[test]
    fn strip_bearer_leaves_bare_tokens_alone() {
        assert_eq!(strip_bearer("  Bearer a.b.c "), "a.b.c");
        assert_eq!(strip_bearer("a.b.c"), "a.b.c");
    }

    #[test]
    fn decode_strips_bearer_prefix() {
        let token = token_with(&json!({"exp": 1_800_000_000, "sub": "admin-1"}));
        let claims = decode(&format!("Bearer {token}")).expect("claims");
        assert_eq!(claims.expires_at_ms, Some(1_800_000_000_000));
        assert_eq!(claims.subject.as_deref(), Some("admin-1"));
    }

    #[test]
    fn subject_priority_follows_field_order() {
        let both = token_with(&json!({"sub": "s", "user_id": "u", "userId": "c", "id": 9}));
        assert_eq!(decode(&both).and_then(|c| c.subject).as_deref(), Some("s"));

        let camel = token_with(&json!({"userId": "c", "id": 9}));
        assert_eq!(decode(&camel).and_then(|c| c.subject).as_deref(), Some("c"));

        let numeric = token_with(&json!({"id": 9}));
        assert_eq!(decode(&numeric).and_then(|c| c.subject).as_deref(), Some("9"));

        let none = token_with(&json!({"exp": 1}));
        assert_eq!(decode(&none).and_then(|c| c.subject), None);
    }

    #[test]
    fn expiry_checks_against_now() {
        let past = token_with(&json!({"exp": NOW_MS / 1_000 - 60}));
        let future = token_with(&json!({"exp": NOW_MS / 1_000 + 60}));
        let boundary = token_with(&json!({"exp": NOW_MS / 1_000}));
        assert!(is_expired(&past, NOW_MS));
        assert!(!is_expired(&future, NOW_MS));
        assert!(is_expired(&boundary, NOW_MS));
    }

    #[test]
    fn missing_expiry_counts_as_expired() {
        let token = token_with(&json!({"sub": "x"}));
        assert!(is_expired(&token, NOW_MS));
        assert_eq!(remaining_millis(&token, NOW_MS), 0);
        assert!(is_expired("garbage", NOW_MS));
    }

    #[test]
    fn fractional_expiry_is_truncated() {
        let token = token_with(&json!({"exp": 1_700_000_010.75}));
        assert_eq!(remaining_millis(&token, NOW_MS), 10_000);
    }

    #[test]
    fn remaining_millis_never_increases_and_floors_at_zero() {
        let token = token_with(&json!({"exp": NOW_MS / 1_000 + 5}));
        let mut previous = u64::MAX;
        for step in 0..10 {
            let remaining = remaining_millis(&token, NOW_MS + step * 1_000);
            assert!(remaining <= previous);
            previous = remaining;
        }
        assert_eq!(previous, 0);
    }
}
