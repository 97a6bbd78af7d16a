pub mod clock;
pub mod vault;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use clock::{Clock, ManualClock, SystemClock};
pub use vault::{CredentialVault, VaultError};

/// Fixed lifetime of every issued token
pub const TOKEN_LIFETIME_MINUTES: i64 = 30;

const ISSUER: &str = "mike-carcass-api";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token signing secret is not configured")]
    MissingSecret,

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
}

/// A signed, time-boxed bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Whole seconds from issuance to expiry
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }
}

/// Issues and checks the bearer tokens that gate record mutations.
///
/// Tokens are stateless HS256 JWTs: `Unissued -> Valid -> Expired`, with no
/// revocation. The library's own expiry check is turned off and `exp` is
/// compared against the injected [`Clock`] with no leeway, so tests can move
/// time instead of sleeping.
pub struct TokenAuthority {
    vault: CredentialVault,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(vault: CredentialVault, secret: &str, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(Self {
            vault,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock,
        })
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// Exchange the master credential for a token.
    ///
    /// Returns `None` for a wrong password and also when no credential has been
    /// configured; the latter is an operator problem and is only logged.
    pub async fn login(&self, password: &str) -> Option<AuthToken> {
        match self.vault.verify(password).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Login rejected: wrong password");
                return None;
            }
            Err(VaultError::NoCredentialConfigured) => {
                error!("Login rejected: no master credential configured; run `mike set-password`");
                return None;
            }
            Err(e) => {
                error!("Login rejected: {}", e);
                return None;
            }
        }

        match self.issue() {
            Ok(token) => {
                info!("Issued token expiring at {}", token.expires_at);
                Some(token)
            }
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    /// True iff the signature verifies and the token has not yet expired
    pub fn is_valid(&self, token: &str) -> bool {
        let claims = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("Token rejected: {}", e);
                return false;
            }
        };

        let now = self.clock.now().timestamp();
        if now >= claims.exp {
            debug!("Token {} rejected: expired {}s ago", claims.jti, now - claims.exp);
            return false;
        }
        true
    }

    /// New token with a fresh lifetime, only while `token` is still valid
    pub fn refresh(&self, token: &str) -> Option<AuthToken> {
        if !self.is_valid(token) {
            return None;
        }
        match self.issue() {
            Ok(token) => Some(token),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    fn issue(&self) -> Result<AuthToken, AuthError> {
        let issued_at = self.clock.now().trunc_subsecs(0);
        let expires_at = issued_at + Duration::minutes(TOKEN_LIFETIME_MINUTES);
        let claims = Claims {
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;

        Ok(AuthToken {
            token,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Fixture {
        _dir: tempfile::TempDir,
        clock: Arc<ManualClock>,
        authority: TokenAuthority,
    }

    async fn fixture(password: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let vault = CredentialVault::new(dir.path().join("master_password"));
        if let Some(password) = password {
            vault.set_credential(password).await.unwrap();
        }
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
        let authority = TokenAuthority::new(vault, "test-secret", clock.clone()).unwrap();
        Fixture {
            _dir: dir,
            clock,
            authority,
        }
    }

    #[tokio::test]
    async fn login_issues_thirty_minute_token() {
        let fx = fixture(Some("hunter2")).await;

        let token = fx.authority.login("hunter2").await.unwrap();

        assert_eq!(token.issued_at, fx.clock.now());
        assert_eq!(token.expires_at - token.issued_at, Duration::minutes(30));
        assert_eq!(token.expires_in(), 1800);
        assert!(fx.authority.is_valid(&token.token));
    }

    #[tokio::test]
    async fn token_expires_after_lifetime() {
        let fx = fixture(Some("hunter2")).await;
        let token = fx.authority.login("hunter2").await.unwrap();

        fx.clock.advance(Duration::minutes(29));
        assert!(fx.authority.is_valid(&token.token));

        fx.clock.advance(Duration::minutes(2));
        assert!(!fx.authority.is_valid(&token.token));
    }

    #[tokio::test]
    async fn expiry_instant_is_exclusive() {
        let fx = fixture(Some("hunter2")).await;
        let token = fx.authority.login("hunter2").await.unwrap();

        fx.clock.set(token.expires_at);
        assert!(!fx.authority.is_valid(&token.token));
    }

    #[tokio::test]
    async fn refresh_extends_from_now() {
        let fx = fixture(Some("hunter2")).await;
        let first = fx.authority.login("hunter2").await.unwrap();

        fx.clock.advance(Duration::minutes(20));
        let second = fx.authority.refresh(&first.token).unwrap();

        assert_ne!(second.token, first.token);
        assert_eq!(second.issued_at, fx.clock.now());
        assert_eq!(second.expires_at, first.expires_at + Duration::minutes(20));

        // the old token is not revoked, it simply runs out first
        fx.clock.advance(Duration::minutes(15));
        assert!(!fx.authority.is_valid(&first.token));
        assert!(fx.authority.is_valid(&second.token));
    }

    #[tokio::test]
    async fn refresh_of_expired_token_fails() {
        let fx = fixture(Some("hunter2")).await;
        let token = fx.authority.login("hunter2").await.unwrap();

        fx.clock.advance(Duration::minutes(31));
        assert!(fx.authority.refresh(&token.token).is_none());
    }

    #[tokio::test]
    async fn wrong_password_gets_nothing() {
        let fx = fixture(Some("hunter2")).await;
        assert!(fx.authority.login("hunter3").await.is_none());
        assert!(fx.authority.login("").await.is_none());
    }

    #[tokio::test]
    async fn unconfigured_vault_gets_nothing() {
        let fx = fixture(None).await;
        assert!(fx.authority.login("anything").await.is_none());
    }

    #[tokio::test]
    async fn foreign_or_malformed_tokens_are_invalid() {
        let fx = fixture(Some("hunter2")).await;
        let other = TokenAuthority::new(
            CredentialVault::new(fx._dir.path().join("master_password")),
            "another-secret",
            fx.clock.clone(),
        )
        .unwrap();
        let foreign = other.login("hunter2").await.unwrap();

        assert!(!fx.authority.is_valid(&foreign.token));
        assert!(!fx.authority.is_valid("not.a.token"));
        assert!(!fx.authority.is_valid(""));
        assert!(fx.authority.refresh(&foreign.token).is_none());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let result = TokenAuthority::new(CredentialVault::new("unused"), "", Arc::new(SystemClock));
        assert!(matches!(result, Err(AuthError::MissingSecret)));
    }
}
