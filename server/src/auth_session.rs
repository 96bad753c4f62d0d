//! Signed session tokens for the browser session cookie.
//!
//! A [SessionToken] carries the authenticated user's id and the time of login. Its string
//! representation is `"<user_id>.<issued_at>.<signature>"`, where the signature is a
//! base64url-encoded HMAC-SHA256 over the first two fields, keyed with the application
//! secret. The token is stateless; expiry is enforced by checking `issued_at` against the
//! maximum age on every parse.

use crate::data_store::UserId;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use base64::Engine;
use ring::hmac;

pub struct SessionToken {
    user_id: UserId,
    issued_at: i64,
}

impl SessionToken {
    /// Create a fresh session token for the given user, issued now.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            issued_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Parse and verify a session token from its cookie string representation.
    pub fn from_string(
        data: &str,
        secret: &str,
        max_age: std::time::Duration,
    ) -> Result<Self, SessionError> {
        let (payload, signature) = data
            .rsplit_once('.')
            .ok_or(SessionError::InvalidTokenStructure)?;
        let signature = BASE64URL
            .decode(signature)
            .map_err(|_| SessionError::InvalidTokenStructure)?;

        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        hmac::verify(&key, payload.as_bytes(), &signature)
            .map_err(|_| SessionError::SignatureVerificationFailed)?;

        let (user_id, issued_at) = payload
            .split_once('.')
            .ok_or(SessionError::InvalidTokenStructure)?;
        let user_id = user_id
            .parse()
            .map_err(|_| SessionError::InvalidTokenStructure)?;
        let issued_at: i64 = issued_at
            .parse()
            .map_err(|_| SessionError::InvalidTokenStructure)?;

        if chrono::Utc::now().timestamp() - issued_at > max_age.as_secs() as i64 {
            return Err(SessionError::ExpiredToken);
        }

        Ok(Self { user_id, issued_at })
    }

    /// Serialize and sign the session token for use as a cookie value.
    pub fn as_string(&self, secret: &str) -> String {
        let payload = format!("{}.{}", self.user_id, self.issued_at);
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let signature = hmac::sign(&key, payload.as_bytes());
        format!("{}.{}", payload, BASE64URL.encode(signature.as_ref()))
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionError {
    InvalidTokenStructure,
    SignatureVerificationFailed,
    ExpiredToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";
    const MAX_AGE: std::time::Duration = std::time::Duration::from_secs(3600);

    #[test]
    fn test_roundtrip() {
        let token = SessionToken::new(42);
        let parsed = SessionToken::from_string(&token.as_string(SECRET), SECRET, MAX_AGE).unwrap();
        assert_eq!(parsed.user_id(), 42);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = SessionToken::new(42).as_string(SECRET);
        let tampered = token.replacen("42", "43", 1);
        assert!(matches!(
            SessionToken::from_string(&tampered, SECRET, MAX_AGE),
            Err(SessionError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = SessionToken::new(42).as_string(SECRET);
        assert!(matches!(
            SessionToken::from_string(&token, "other-secret", MAX_AGE),
            Err(SessionError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = SessionToken {
            user_id: 42,
            issued_at: chrono::Utc::now().timestamp() - 7200,
        };
        assert!(matches!(
            SessionToken::from_string(&token.as_string(SECRET), SECRET, MAX_AGE),
            Err(SessionError::ExpiredToken)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            SessionToken::from_string("no-dots-here", SECRET, MAX_AGE),
            Err(SessionError::InvalidTokenStructure)
        ));
    }
}
