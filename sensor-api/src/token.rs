//! Compact HS256 bearer tokens.
//!
//! A token is `base64url(header) "." base64url(claims) "." base64url(signature)`
//! where the signature is HMAC-SHA256 over the first two segments joined by a
//! dot. Segments use the unpadded URL-safe alphabet, which keeps the format
//! readable by any standard JWT library.

use crate::config::TokenConfig;
use crate::errors::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

const HEADER: Header = Header {
    alg: "HS256",
    typ: "JWT",
};

#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
    lifetime_secs: i64,
}

impl TokenCodec {
    pub fn new(config: &TokenConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(Error::Config("token secret must not be empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(config.secret.as_bytes())
            .map_err(|e| Error::Config(format!("invalid token secret: {}", e)))?;

        Ok(Self {
            mac,
            lifetime_secs: config.lifetime_secs,
        })
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    pub fn issue(&self, subject: &str) -> String {
        self.issue_at(subject, Utc::now().timestamp())
    }

    /// Issues a token as if the current time were `now` (seconds since epoch).
    pub fn issue_at(&self, subject: &str, now: i64) -> String {
        let claims = Claims {
            sub: subject.to_string(),
            email: subject.to_string(),
            iat: now,
            exp: now.saturating_add(self.lifetime_secs),
        };

        // Neither struct can fail to serialize: no maps with non-string keys,
        // no custom serializers.
        let header = serde_json::to_vec(&HEADER).unwrap_or_default();
        let payload = serde_json::to_vec(&claims).unwrap_or_default();

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));

        format!("{}.{}", signing_input, signature)
    }

    pub fn verify(&self, token: &str) -> std::result::Result<String, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verifies `token` against the clock value `now` and returns its subject.
    pub fn verify_at(&self, token: &str, now: i64) -> std::result::Result<String, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| TokenError::BadSignature)?;

        let mut mac = self.mac.clone();
        mac.update(parts[0].as_bytes());
        mac.update(b".");
        mac.update(parts[1].as_bytes());
        // verify_slice compares in constant time.
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(claims.sub)
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn codec(secret: &str, lifetime_secs: i64) -> TokenCodec {
        TokenCodec::new(&TokenConfig {
            secret: secret.to_string(),
            lifetime_secs,
        })
        .unwrap()
    }

    #[test]
    fn test_issue_then_verify_returns_subject() {
        let codec = codec("test-secret", 3600);
        let token = codec.issue_at("operator@plant.io", NOW);

        assert_eq!(
            codec.verify_at(&token, NOW + 10),
            Ok("operator@plant.io".to_string())
        );
    }

    #[test]
    fn test_token_has_three_segments_and_expected_claims() {
        let codec = codec("test-secret", 3600);
        let token = codec.issue_at("a@b.c", NOW);
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");

        let claims: Claims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(
            claims,
            Claims {
                sub: "a@b.c".to_string(),
                email: "a@b.c".to_string(),
                iat: NOW,
                exp: NOW + 3600,
            }
        );
    }

    #[test]
    fn test_tampered_payload_fails_signature_check() {
        let codec = codec("test-secret", 3600);
        let token = codec.issue_at("user@example.com", NOW);
        let parts: Vec<&str> = token.split('.').collect();

        for i in 0..parts[1].len() {
            let mut payload = parts[1].as_bytes().to_vec();
            payload[i] = if payload[i] == b'A' { b'B' } else { b'A' };
            let tampered = format!(
                "{}.{}.{}",
                parts[0],
                String::from_utf8(payload).unwrap(),
                parts[2]
            );
            assert_eq!(
                codec.verify_at(&tampered, NOW),
                Err(TokenError::BadSignature),
                "byte {} of the payload was altered",
                i
            );
        }
    }

    #[test]
    fn test_forged_claims_are_rejected() {
        let codec = codec("test-secret", 3600);
        let token = codec.issue_at("user@example.com", NOW);
        let parts: Vec<&str> = token.split('.').collect();

        let forged = Claims {
            sub: "admin@example.com".to_string(),
            email: "admin@example.com".to_string(),
            iat: NOW,
            exp: NOW + 3600,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(
            codec.verify_at(&forged_token, NOW),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = codec("secret-one", 3600).issue_at("user@example.com", NOW);
        assert_eq!(
            codec("secret-two", 3600).verify_at(&token, NOW),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = codec("test-secret", 60);
        let token = codec.issue_at("user@example.com", NOW);

        assert!(codec.verify_at(&token, NOW + 59).is_ok());
        assert_eq!(codec.verify_at(&token, NOW + 60), Err(TokenError::Expired));
        assert_eq!(codec.verify_at(&token, NOW + 61), Err(TokenError::Expired));
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = codec("test-secret", 3600);

        for token in ["", "abc", "a.b", "a.b.c.d", "a..c", ".b.c", "a.b."] {
            assert_eq!(
                codec.verify_at(token, NOW),
                Err(TokenError::Malformed),
                "token {:?}",
                token
            );
        }
    }

    #[test]
    fn test_signed_garbage_payload_is_malformed() {
        let codec = codec("test-secret", 3600);
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"x"}"#);
        let input = format!("{}.{}", header, payload);
        let signature = URL_SAFE_NO_PAD.encode(codec.sign(input.as_bytes()));

        assert_eq!(
            codec.verify_at(&format!("{}.{}", input, signature), NOW),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_huge_lifetime_saturates_instead_of_wrapping() {
        let codec = codec("test-secret", i64::MAX);
        let token = codec.issue_at("user@example.com", NOW);
        let parts: Vec<&str> = token.split('.').collect();
        let claims: Claims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims.exp, i64::MAX);

        assert_eq!(
            codec.verify_at(&token, NOW + 1),
            Ok("user@example.com".to_string())
        );
        assert!(codec.verify(&codec.issue("user@example.com")).is_ok());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let result = TokenCodec::new(&TokenConfig {
            secret: String::new(),
            lifetime_secs: 60,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
