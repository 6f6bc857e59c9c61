use crate::errors::Result;
use crate::metrics::{LOGINS_TOTAL, TOKENS_REJECTED_TOTAL};
use crate::model::{AuthResponse, LoginRequest};
use crate::token::{TokenCodec, TokenError};
use crate::validate::validate_login;
use tracing::{debug, info};

/// Simplified login: every well-formed email/password pair gets a token.
#[derive(Clone)]
pub struct AuthService {
    codec: TokenCodec,
}

impl AuthService {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    pub fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        info!("Login attempt for {}", request.email);
        validate_login(request)?;

        let email = request.email.trim().to_string();
        let token = self.codec.issue(&email);
        LOGINS_TOTAL.inc();
        info!(
            "Issued token for {} valid for {}s",
            email,
            self.codec.lifetime_secs()
        );

        Ok(AuthResponse::success(token, email))
    }

    /// Returns the email carried by `token`.
    pub fn validate(&self, token: &str) -> std::result::Result<String, TokenError> {
        self.codec.verify(token).map_err(|e| {
            let reason = match e {
                TokenError::Malformed => "malformed",
                TokenError::BadSignature => "bad_signature",
                TokenError::Expired => "expired",
            };
            TOKENS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
            debug!("Rejected token: {}", e);
            e
        })
    }
}
