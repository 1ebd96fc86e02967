//! The credential gate: decides whether a stored bearer token may open or
//! resume a connection.
//!
//! The token is a JWT, but the gate never verifies its signature. The
//! storage layer is the trust boundary; the remote endpoint verifies the
//! token for real when the connection opens. All the gate needs is the
//! `exp` claim, read straight out of the payload segment.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::SessionError;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of wall-clock time in Unix milliseconds.
pub trait Clock: Send + Sync + 'static {
    /// Current time.
    fn now_ms(&self) -> u64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A decoded bearer token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at_ms: u64,
}

impl Credential {
    /// The raw bearer token, as passed to the endpoint.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry as Unix milliseconds.
    pub fn expires_at_ms(&self) -> u64 {
        self.expires_at_ms
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<f64>,
}

// ---------------------------------------------------------------------------
// CredentialGate
// ---------------------------------------------------------------------------

/// Decodes stored credentials and checks their expiry.
#[derive(Clone)]
pub struct CredentialGate {
    clock: Arc<dyn Clock>,
    skew: Duration,
}

impl CredentialGate {
    /// Creates a gate reading time from `clock`, using `skew` for the
    /// mid-session re-check.
    pub fn new(clock: Arc<dyn Clock>, skew: Duration) -> Self {
        Self { clock, skew }
    }

    /// Decodes a stored credential record without checking expiry.
    ///
    /// The record is normally the JSON serialization of the token string
    /// (`"eyJ..."`); a bare token is accepted as well.
    ///
    /// # Errors
    /// - [`SessionError::NoCredential`]: `raw` is `None` or blank
    /// - [`SessionError::MalformedCredential`]: not a three-segment JWT,
    ///   undecodable payload, or no `exp` claim
    pub fn decode(raw: Option<&str>) -> Result<Credential, SessionError> {
        let raw = raw.map(str::trim).filter(|r| !r.is_empty());
        let Some(raw) = raw else {
            return Err(SessionError::NoCredential);
        };

        let token = if raw.starts_with('"') {
            serde_json::from_str::<String>(raw)
                .map_err(|e| SessionError::MalformedCredential(e.to_string()))?
        } else {
            raw.to_string()
        };

        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => {
                return Err(SessionError::MalformedCredential(
                    "expected three dot-separated segments".into(),
                ));
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| SessionError::MalformedCredential(format!("payload base64: {e}")))?;
        let claims: Claims = serde_json::from_slice(&bytes)
            .map_err(|e| SessionError::MalformedCredential(format!("payload json: {e}")))?;
        let exp = claims
            .exp
            .ok_or_else(|| SessionError::MalformedCredential("missing exp claim".into()))?;

        Ok(Credential {
            expires_at_ms: (exp * 1000.0) as u64,
            token,
        })
    }

    /// Decodes `raw` and rejects it if it is already expired.
    ///
    /// # Errors
    /// Everything [`decode`](Self::decode) returns, plus
    /// [`SessionError::ExpiredCredential`] when `now >= exp`.
    pub fn check(&self, raw: Option<&str>) -> Result<Credential, SessionError> {
        let credential = Self::decode(raw)?;
        if self.is_expired(&credential) {
            return Err(SessionError::ExpiredCredential {
                expired_at_ms: credential.expires_at_ms,
            });
        }
        Ok(credential)
    }

    /// `true` once the current time is at or past the expiry.
    pub fn is_expired(&self, credential: &Credential) -> bool {
        self.clock.now_ms() >= credential.expires_at_ms
    }

    /// The re-check run after a transport-initiated disconnect:
    /// `now - skew >= exp`.
    pub fn expired_mid_session(&self, credential: &Credential) -> bool {
        let now = self.clock.now_ms();
        now.saturating_sub(self.skew.as_millis() as u64) >= credential.expires_at_ms
    }
}

impl std::fmt::Debug for CredentialGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialGate")
            .field("skew", &self.skew)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedClock(AtomicU64);

    impl Clock for FixedClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn gate_at(now_ms: u64) -> CredentialGate {
        CredentialGate::new(
            Arc::new(FixedClock(AtomicU64::new(now_ms))),
            Duration::from_millis(180),
        )
    }

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    /// The record as storage holds it: a JSON string.
    fn stored(exp_secs: u64) -> String {
        serde_json::to_string(&jwt(&format!(r#"{{"id":1,"exp":{exp_secs}}}"#))).unwrap()
    }

    #[test]
    fn test_decode_missing_returns_no_credential() {
        assert!(matches!(
            CredentialGate::decode(None),
            Err(SessionError::NoCredential)
        ));
        assert!(matches!(
            CredentialGate::decode(Some("  ")),
            Err(SessionError::NoCredential)
        ));
    }

    #[test]
    fn test_decode_json_record_scales_exp_to_millis() {
        let credential = CredentialGate::decode(Some(&stored(1_700_000_000))).unwrap();
        assert_eq!(credential.expires_at_ms(), 1_700_000_000_000);
        assert_eq!(credential.token().split('.').count(), 3);
    }

    #[test]
    fn test_decode_bare_token_is_accepted() {
        let token = jwt(r#"{"exp":10}"#);
        let credential = CredentialGate::decode(Some(&token)).unwrap();
        assert_eq!(credential.token(), token);
        assert_eq!(credential.expires_at_ms(), 10_000);
    }

    #[test]
    fn test_decode_two_segments_is_malformed() {
        assert!(matches!(
            CredentialGate::decode(Some("abc.def")),
            Err(SessionError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_decode_bad_base64_is_malformed() {
        assert!(matches!(
            CredentialGate::decode(Some("a.!!!.c")),
            Err(SessionError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_decode_without_exp_is_malformed() {
        let token = jwt(r#"{"sub":"u"}"#);
        assert!(matches!(
            CredentialGate::decode(Some(&token)),
            Err(SessionError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_decode_broken_json_record_is_malformed() {
        assert!(matches!(
            CredentialGate::decode(Some("\"unterminated")),
            Err(SessionError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_check_before_expiry_passes() {
        let gate = gate_at(99_999);
        assert!(gate.check(Some(&stored(100))).is_ok());
    }

    #[test]
    fn test_check_at_expiry_is_expired() {
        let gate = gate_at(100_000);
        assert!(matches!(
            gate.check(Some(&stored(100))),
            Err(SessionError::ExpiredCredential { expired_at_ms: 100_000 })
        ));
    }

    #[test]
    fn test_mid_session_check_applies_skew() {
        let credential = CredentialGate::decode(Some(&stored(100))).unwrap();

        // 100 ms past expiry: still inside the 180 ms skew.
        assert!(!gate_at(100_100).expired_mid_session(&credential));
        assert!(gate_at(100_100).is_expired(&credential));

        // 180 ms past expiry: expired.
        assert!(gate_at(100_180).expired_mid_session(&credential));
    }
}
