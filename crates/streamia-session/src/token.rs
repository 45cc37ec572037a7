//! Bearer-token inspection.
//!
//! The API issues compact JWTs: `header.payload.signature`, each segment
//! base64url-encoded. The front end never holds the signing key, so it
//! can't verify signatures. What it *can* do is decode the payload and
//! check the `exp` claim, which is enough to avoid presenting a token the
//! server will reject anyway. Trust comes from the server over TLS.
//!
//! Validity here means:
//! 1. exactly three dot-separated segments,
//! 2. the payload segment decodes to JSON,
//! 3. `exp` (Unix seconds) is absent, or strictly greater than now.
//!
//! A payload that is JSON but not an object carries no claims, so it has
//! no `exp` and never expires.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde_json::{Map, Value};

/// Why a token failed inspection.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Not a `header.payload.signature` string.
    #[error("expected 3 dot-separated segments, found {segments}")]
    Malformed { segments: usize },

    /// The payload segment isn't base64.
    #[error("payload segment is not base64url: {0}")]
    Encoding(#[source] base64::DecodeError),

    /// The payload decoded, but isn't JSON.
    #[error("payload segment is not JSON: {0}")]
    Payload(#[source] serde_json::Error),

    /// `exp` is present but isn't a number.
    #[error("exp claim is not a number")]
    InvalidExpiry,

    /// `exp` is at or before the current time.
    #[error("token expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// The decoded payload of a token.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// Expiry as Unix seconds, if the token carries one.
    pub exp: Option<i64>,
    /// Every claim, `exp` included, as decoded.
    pub raw: Map<String, Value>,
}

impl Claims {
    /// The `sub` claim, usually the user id.
    pub fn subject(&self) -> Option<&str> {
        self.raw.get("sub").and_then(Value::as_str)
    }

    /// Looks up an arbitrary claim.
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.raw.get(claim)
    }

    /// `true` if `exp` is absent or still in the future at `now`.
    pub fn is_live_at(&self, now: i64) -> bool {
        self.exp.is_none_or(|exp| exp > now)
    }
}

/// Decodes a token's payload without checking expiry.
///
/// # Errors
/// [`TokenError::Malformed`], [`TokenError::Encoding`],
/// [`TokenError::Payload`] or [`TokenError::InvalidExpiry`].
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(TokenError::Malformed {
            segments: segments.len(),
        });
    };

    let payload = payload.trim_end_matches('=');
    // Real tokens are base64url; tolerate the standard alphabet too, which
    // is what a browser's `atob` would have accepted.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(TokenError::Encoding)?;
    let raw = match serde_json::from_slice(&bytes).map_err(TokenError::Payload)? {
        Value::Object(raw) => raw,
        _ => Map::new(),
    };

    let exp = match raw.get("exp") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(
            n.as_i64()
                .or_else(|| n.as_f64().map(|f| f.floor() as i64))
                .ok_or(TokenError::InvalidExpiry)?,
        ),
        Some(_) => return Err(TokenError::InvalidExpiry),
    };

    Ok(Claims { exp, raw })
}

/// Decodes `token` and checks its expiry against `now` (Unix seconds).
pub fn validate_at(token: &str, now: i64) -> Result<Claims, TokenError> {
    let claims = decode_claims(token)?;
    match claims.exp {
        Some(exp) if exp <= now => Err(TokenError::Expired { exp, now }),
        _ => Ok(claims),
    }
}

/// `true` if `token` is structurally valid and unexpired right now.
pub fn is_valid(token: &str) -> bool {
    validate_at(token, SystemClock.now_secs()).is_ok()
}

/// Builds an unsigned token around `claims`.
///
/// The header is `{"alg":"none","typ":"JWT"}` and the signature segment is
/// a fixed placeholder. Only meant for fixtures and local simulations,
/// since nothing on this side checks signatures.
pub fn encode_unsigned(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.unsigned")
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// A source of "now" in Unix seconds, injectable so expiry can be tested
/// without sleeping.
pub trait Clock: Send + Sync + 'static {
    fn now_secs(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    /// Starts the clock at `now`.
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::AcqRel);
    }

    /// Jumps the clock to `now`.
    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }
}

// =========================================================================
// Tests
// =========================================================================
