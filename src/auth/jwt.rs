use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::auth::claims::{Claims, Identity};
use crate::auth::repo_types::UserId;
use crate::config::JwtConfig;

/// Session tokens live for exactly one hour.
pub const TOKEN_TTL: Duration = Duration::hours(1);

/// Single opaque rejection: malformed, bad signature, wrong issuer/audience
/// and expired tokens all look the same to the caller.
#[derive(Debug, Error)]
#[error("invalid or expired token")]
pub struct InvalidToken;

#[derive(Debug, Error)]
#[error("failed to sign token")]
pub struct SigningError(#[from] jsonwebtoken::errors::Error);

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    pub fn issue(&self, id: UserId, username: &str) -> Result<String, SigningError> {
        self.issue_at(id, username, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        id: UserId,
        username: &str,
        now: OffsetDateTime,
    ) -> Result<String, SigningError> {
        let exp = now + TOKEN_TTL;
        let claims = Claims {
            id,
            username: username.to_string(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Identity, InvalidToken> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Verifies signature, issuer and audience, then checks expiry against
    /// `now` with no leeway.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Identity, InvalidToken> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            InvalidToken
        })?;

        if now.unix_timestamp() >= data.claims.exp {
            debug!(user_id = data.claims.id, "jwt expired");
            return Err(InvalidToken);
        }

        debug!(user_id = data.claims.id, "jwt verified");
        Ok(data.claims.into())
    }
}

#[cfg(test)]
pub(crate) fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret-test-secret-test-secret".into(),
        issuer: "test-issuer".into(),
        audience: "test-aud".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::new(&test_jwt_config())
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = make_keys();
        let token = keys.issue(7, "alice").expect("sign");
        let identity = keys.verify(&token).expect("verify token");
        assert_eq!(
            identity,
            Identity {
                id: 7,
                username: "alice".into()
            }
        );
    }

    #[test]
    fn token_expires_after_one_hour() {
        let keys = make_keys();
        let issued = OffsetDateTime::now_utc();
        let token = keys.issue_at(1, "alice", issued).expect("sign");

        let just_before = issued + TOKEN_TTL - Duration::seconds(1);
        assert!(keys.verify_at(&token, just_before).is_ok());

        let at_expiry = issued + TOKEN_TTL;
        assert!(keys.verify_at(&token, at_expiry).is_err());

        let long_after = issued + Duration::hours(2);
        assert!(keys.verify_at(&token, long_after).is_err());
    }

    #[test]
    fn token_issued_in_the_past_is_rejected_now() {
        let keys = make_keys();
        let two_hours_ago = OffsetDateTime::now_utc() - Duration::hours(2);
        let token = keys.issue_at(1, "alice", two_hours_ago).expect("sign");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys();
        let bad = JwtKeys::new(&JwtConfig {
            issuer: "other-iss".into(),
            audience: "other-aud".into(),
            ..test_jwt_config()
        });
        let token = good.issue(1, "alice").expect("sign");
        assert!(bad.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_foreign_signature() {
        let good = make_keys();
        let forger = JwtKeys::new(&JwtConfig {
            secret: "a-completely-different-signing-key!!".into(),
            ..test_jwt_config()
        });
        let forged = forger.issue(1, "alice").expect("sign");
        assert!(good.verify(&forged).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys();
        for token in ["", "not.a.jwt", "abc", "a.b.c.d"] {
            assert!(keys.verify(token).is_err(), "accepted {token:?}");
        }
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let keys = make_keys();
        let token = keys.issue(1, "alice").expect("sign");
        let mut parts: Vec<&str> = token.split('.').collect();
        let other = keys.issue(2, "mallory").expect("sign");
        let other_payload = other.split('.').nth(1).expect("payload");
        parts[1] = other_payload;
        assert!(keys.verify(&parts.join(".")).is_err());
    }
}
