use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, users::repo_types::User};

/// Token type used to distinguish access and refresh JWTs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,     // user ID
    pub email: String, // login identifier at issue time
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub jti: Uuid, // unique per token
    pub token_type: TokenKind,
}

/// Access/refresh pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Mints and checks signed tokens for authenticated users.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user: &User) -> anyhow::Result<TokenPair>;
    fn verify_access(&self, token: &str) -> anyhow::Result<Claims>;
    /// Accepts tokens expired for less than the configured grace period.
    fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims>;
}

/// HS256 keys plus lifetimes.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    refresh_grace: Duration,
}

fn minutes(m: i64) -> Duration {
    Duration::from_secs((m.max(0) as u64).saturating_mul(60))
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: minutes(cfg.ttl_minutes),
            refresh_ttl: minutes(cfg.refresh_ttl_minutes),
            refresh_grace: minutes(cfg.refresh_grace_minutes),
        }
    }

    fn sign_with_kind(&self, user: &User, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = TimeDuration::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| anyhow::anyhow!("token lifetime out of range"))?;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            token_type: kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    fn decode_with_leeway(&self, token: &str, leeway: Duration) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        // jsonwebtoken computes `now - leeway` on u64
        validation.leeway = leeway.as_secs().min(jsonwebtoken::get_current_timestamp());
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.token_type, "jwt verified");
        Ok(data.claims)
    }
}

impl TokenIssuer for JwtKeys {
    fn issue(&self, user: &User) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access: self.sign_with_kind(user, TokenKind::Access)?,
            refresh: self.sign_with_kind(user, TokenKind::Refresh)?,
        })
    }

    fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.decode_with_leeway(token, Duration::ZERO)?;
        if claims.token_type != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        Ok(claims)
    }

    fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.decode_with_leeway(token, self.refresh_grace)?;
        if claims.token_type != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        let mut cfg = AppConfig::for_tests().jwt;
        cfg.secret = secret.into();
        cfg.issuer = issuer.into();
        cfg.audience = audience.into();
        JwtKeys::from_config(&cfg)
    }

    fn user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "h".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone_number: None,
            profile_picture: None,
            date_of_birth: None,
            gender: None,
            role: None,
            is_active: false,
            is_staff: false,
            is_superuser: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Signs arbitrary claims with the keys' secret.
    fn forge(keys: &JwtKeys, claims: &Claims) -> String {
        encode(&Header::default(), claims, &keys.encoding).unwrap()
    }

    #[test]
    fn issued_pair_carries_email_and_subject() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user = user();
        let pair = keys.issue(&user).expect("issue");
        assert_ne!(pair.access, pair.refresh);

        let access = keys.verify_access(&pair.access).expect("verify access");
        assert_eq!(access.sub, user.id);
        assert_eq!(access.email, "a@x.com");
        assert_eq!(access.iss, "test-issuer");
        assert_eq!(access.aud, "test-aud");
        assert_eq!(access.token_type, TokenKind::Access);

        let refresh = keys.verify_refresh(&pair.refresh).expect("verify refresh");
        assert_eq!(refresh.sub, user.id);
        assert_eq!(refresh.email, "a@x.com");
        assert_eq!(refresh.token_type, TokenKind::Refresh);
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn two_issues_never_collide() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let user = user();
        let a = keys.issue(&user).unwrap();
        let b = keys.issue(&user).unwrap();
        assert_ne!(a.access, b.access);
        assert_ne!(a.refresh, b.refresh);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let pair = keys.issue(&user()).unwrap();
        let err = keys.verify_refresh(&pair.access).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
        let err = keys.verify_access(&pair.refresh).unwrap_err();
        assert!(err.to_string().contains("not an access token"));
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_keys = make_keys("same-secret", "bad-iss", "bad-aud");
        let pair = good_keys.issue(&user()).unwrap();
        assert!(bad_keys.verify_access(&pair.access).is_err());
    }

    #[test]
    fn verify_rejects_other_secret() {
        let a = make_keys("secret-a", "iss", "aud");
        let b = make_keys("secret-b", "iss", "aud");
        let pair = a.issue(&user()).unwrap();
        assert!(b.verify_access(&pair.access).is_err());
    }

    #[test]
    fn expired_refresh_within_grace_still_verifies() {
        // grace is 120 minutes in the test config
        let keys = make_keys("dev-secret", "iss", "aud");
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let mut claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@x.com".into(),
            iat: now - 7200,
            exp: now - 600,
            iss: "iss".into(),
            aud: "aud".into(),
            jti: Uuid::new_v4(),
            token_type: TokenKind::Refresh,
        };
        assert!(keys.verify_refresh(&forge(&keys, &claims)).is_ok());

        claims.exp = now - 3 * 3600;
        assert!(keys.verify_refresh(&forge(&keys, &claims)).is_err());

        claims.exp = now - 600;
        claims.token_type = TokenKind::Access;
        assert!(keys.verify_access(&forge(&keys, &claims)).is_err());
    }

    #[test]
    fn lifetimes_never_overflow() {
        assert_eq!(minutes(-5), Duration::ZERO);
        assert_eq!(minutes(2), Duration::from_secs(120));
        assert_eq!(minutes(i64::MAX), Duration::from_secs(u64::MAX));

        let mut cfg = AppConfig::for_tests().jwt;
        cfg.ttl_minutes = i64::MAX;
        assert!(JwtKeys::from_config(&cfg).issue(&user()).is_err());

        let mut cfg = AppConfig::for_tests().jwt;
        cfg.refresh_grace_minutes = i64::MAX;
        let keys = JwtKeys::from_config(&cfg);
        let pair = keys.issue(&user()).unwrap();
        assert!(keys.verify_refresh(&pair.refresh).is_ok());
    }
}
