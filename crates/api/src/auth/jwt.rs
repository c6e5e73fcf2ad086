//! Access-token minting and verification.
//!
//! Access tokens are HS256-signed JWTs. The payload is an open claim map:
//! `sub` (user id) and `exp` (Unix seconds) are always present, and every
//! flag passed at mint time becomes a `<flag>: true` claim.
//!
//! Verification order matters:
//!
//! 1. the header must name HS256 (any other `alg`, `none` included, is
//!    [`TokenError::InvalidSignature`]);
//! 2. the payload must decode and `exp` must be numeric;
//! 3. an `exp` at or before "now" is [`TokenError::Expired`];
//! 4. the signature must verify.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use keystone_core::error::ConfigError;
use keystone_core::types::{DbId, Timestamp};
use serde_json::{Map, Value};

/// The only accepted signing scheme.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Flag claim marking an identity whose email is not verified yet.
pub const PENDING_FLAG: &str = "pending";

/// Environment variable holding the signing key.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET_KEY";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Wrong algorithm or a signature that does not verify.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The token or its claims could not be decoded.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// `exp` is at or before the current time.
    #[error("Token expired")]
    Expired,

    /// Encoding failed while minting.
    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Verified claim set.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    exp: i64,
    claims: Map<String, Value>,
}

impl TokenClaims {
    /// The `sub` claim as a user id, if it is a positive integer.
    pub fn subject(&self) -> Option<DbId> {
        self.claims
            .get("sub")
            .and_then(Value::as_i64)
            .filter(|id| *id > 0)
    }

    /// Expiry as Unix seconds.
    pub fn expires_at(&self) -> i64 {
        self.exp
    }

    /// `true` only when the claim exists and is the boolean `true`.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.claims.get(name), Some(Value::Bool(true)))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }
}

/// Signs and verifies access tokens with a symmetric key.
///
/// Built once at startup from configuration and shared behind an `Arc`.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &SIGNING_ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Build a signer. An empty key is a fatal configuration error.
    pub fn new(secret: &str) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::Missing(JWT_SECRET_ENV));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Mint a token for `subject` that expires at `expires_at`.
    pub fn mint(
        &self,
        subject: DbId,
        flags: &[&str],
        expires_at: Timestamp,
    ) -> Result<String, TokenError> {
        let mut claims = Map::new();
        for flag in flags {
            claims.insert((*flag).to_string(), Value::Bool(true));
        }
        // Reserved claims win over a flag of the same name.
        claims.insert("sub".into(), Value::from(subject));
        claims.insert("exp".into(), Value::from(expires_at.timestamp()));

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify a token as of `now` (Unix seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
        let header = decode_header(token).map_err(|err| {
            if names_algorithm(token) {
                TokenError::InvalidSignature
            } else {
                classify(err)
            }
        })?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(TokenError::InvalidSignature);
        }

        let claims = peek_claims(token)?;
        let exp = claims
            .get("exp")
            .and_then(numeric_seconds)
            .ok_or_else(|| TokenError::Malformed("exp claim is missing or not a number".into()))?;

        if now >= exp {
            return Err(TokenError::Expired);
        }

        // Header and payload decoded above, so any failure here is the signature.
        decode::<Map<String, Value>>(token, &self.decoding_key, &validation(true))
            .map_err(|_| TokenError::InvalidSignature)?;

        Ok(TokenClaims { exp, claims })
    }
}

/// Whether the header segment is a JSON object carrying an `alg` key.
///
/// `decode_header` rejects algorithms it does not know (`none` included)
/// as a parse error; such a token names the wrong algorithm, it is not garbage.
fn names_algorithm(token: &str) -> bool {
    let Some((header, _)) = token.split_once('.') else {
        return false;
    };
    URL_SAFE_NO_PAD
        .decode(header)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Map<String, Value>>(&bytes).ok())
        .is_some_and(|header| header.contains_key("alg"))
}

/// Decode the payload without checking the signature.
fn peek_claims(token: &str) -> Result<Map<String, Value>, TokenError> {
    decode::<Map<String, Value>>(token, &DecodingKey::from_secret(&[]), &validation(false))
        .map(|data| data.claims)
        .map_err(classify)
}

/// Expiry and audience are checked by hand; only the signature is left to the library.
fn validation(check_signature: bool) -> Validation {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    if !check_signature {
        validation.insecure_disable_signature_validation();
    }
    validation
}

fn numeric_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(err.to_string()),
    }
}

/// Token lifetimes and signing key, loaded from the environment.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token (session) lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_token_expiry_mins", &self.access_token_expiry_mins)
            .field("refresh_token_expiry_days", &self.refresh_token_expiry_days)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret-that-is-long-enough-for-hmac").unwrap()
    }

    fn in_minutes(mins: i64) -> Timestamp {
        Utc::now() + Duration::minutes(mins)
    }

    /// Swap one character of the signature segment for a different base64url character.
    fn tamper_signature(token: &str, index: usize) -> String {
        let (message, signature) = token.rsplit_once('.').unwrap();
        let mut sig: Vec<char> = signature.chars().collect();
        sig[index] = if sig[index] == 'A' { 'B' } else { 'A' };
        format!("{message}.{}", sig.into_iter().collect::<String>())
    }

    #[test]
    fn empty_key_is_a_configuration_error() {
        assert_eq!(
            TokenSigner::new("").unwrap_err(),
            ConfigError::Missing("JWT_SECRET_KEY")
        );
    }

    #[test]
    fn mint_and_verify_round_trip() {
        let signer = signer();
        let expires_at = in_minutes(15);
        let token = signer.mint(42, &[], expires_at).unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.subject(), Some(42));
        assert_eq!(claims.expires_at(), expires_at.timestamp());
        assert!(claims.expires_at() > Utc::now().timestamp());
        assert!(!claims.flag(PENDING_FLAG));
        assert_eq!(claims.as_map().len(), 2);
    }

    #[test]
    fn flags_become_boolean_claims() {
        let signer = signer();
        let token = signer.mint(7, &[PENDING_FLAG, "beta"], in_minutes(5)).unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.get("pending"), Some(&Value::Bool(true)));
        assert!(claims.flag("beta"));
        assert!(!claims.flag("admin"));
    }

    #[test]
    fn reserved_claims_are_not_overridden_by_flags() {
        let signer = signer();
        let token = signer.mint(9, &["sub"], in_minutes(5)).unwrap();
        assert_eq!(signer.verify(&token).unwrap().subject(), Some(9));
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = signer();
        let token = signer.mint(1, &[], Utc::now() - Duration::minutes(5)).unwrap();
        assert_eq!(signer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let signer = signer();
        let expires_at = in_minutes(10);
        let token = signer.mint(1, &[], expires_at).unwrap();
        let exp = expires_at.timestamp();

        assert!(signer.verify_at(&token, exp - 1).is_ok());
        assert_eq!(signer.verify_at(&token, exp), Err(TokenError::Expired));
    }

    #[test]
    fn expired_token_is_expired_whatever_the_signature() {
        let token = signer().mint(1, &[], Utc::now() - Duration::hours(1)).unwrap();

        let other = TokenSigner::new("another-secret").unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::Expired));
        assert_eq!(signer().verify(&tamper_signature(&token, 0)), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let signer = signer();
        let token = signer.mint(1, &[], in_minutes(15)).unwrap();
        let sig_len = token.rsplit_once('.').unwrap().1.len();

        // The final character may only carry padding bits, so it is skipped.
        for index in 0..sig_len - 1 {
            assert_eq!(
                signer.verify(&tamper_signature(&token, index)),
                Err(TokenError::InvalidSignature),
                "flipping signature character {index} must invalidate the token"
            );
        }
    }

    #[test]
    fn different_key_is_rejected() {
        let token = signer().mint(1, &[], in_minutes(15)).unwrap();
        let other = TokenSigner::new("secret-bravo").unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let secret = "test-secret-that-is-long-enough-for-hmac";
        let mut claims = Map::new();
        claims.insert("sub".into(), Value::from(1));
        claims.insert("exp".into(), Value::from(in_minutes(15).timestamp()));
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(signer().verify(&token), Err(TokenError::InvalidSignature));
    }

    /// Hand-assembled token with the given header and a live payload.
    fn unsigned_token(header: &str) -> String {
        let payload = format!(r#"{{"sub":1,"exp":{}}}"#, in_minutes(15).timestamp());
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn none_algorithm_is_rejected_as_signature() {
        let token = unsigned_token(r#"{"alg":"none","typ":"JWT"}"#);
        assert_eq!(signer().verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn unknown_algorithm_is_rejected_as_signature() {
        let token = unsigned_token(r#"{"alg":"XS999","typ":"JWT"}"#);
        assert_eq!(signer().verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn header_without_algorithm_is_malformed() {
        let token = unsigned_token(r#"{"typ":"JWT"}"#);
        assert_matches!(signer().verify(&token), Err(TokenError::Malformed(_)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert_matches!(signer().verify("not-a-jwt"), Err(TokenError::Malformed(_)));
        assert_matches!(signer().verify(""), Err(TokenError::Malformed(_)));
    }

    #[test]
    fn non_numeric_expiry_is_malformed() {
        let secret = "test-secret-that-is-long-enough-for-hmac";
        let mut claims = Map::new();
        claims.insert("sub".into(), Value::from(1));
        claims.insert("exp".into(), Value::from("tomorrow"));
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert_matches!(signer().verify(&token), Err(TokenError::Malformed(_)));
    }

    #[test]
    fn non_numeric_subject_has_no_subject() {
        let secret = "test-secret-that-is-long-enough-for-hmac";
        let mut claims = Map::new();
        claims.insert("sub".into(), Value::from("forty-two"));
        claims.insert("exp".into(), Value::from(in_minutes(15).timestamp()));
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        let claims = signer().verify(&token).unwrap();
        assert_eq!(claims.subject(), None);
    }

    #[test]
    fn config_debug_redacts_secret() {
        let config = JwtConfig {
            secret: "super-secret".into(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        };
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
