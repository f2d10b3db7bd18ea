//! JWT token generation and verification.

use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Custom claims carried alongside the registered ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub email: String,
    pub roles: Vec<String>,
}

/// Verified token contents handed to request handlers.
#[derive(Debug, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct JwtConfig {
    key: HS256Key,
    pub token_expiry: i64,
    pub issuer: Option<String>,
}

impl JwtConfig {
    /// Expects the `JWT_SECRET` env var (the token signing secret).
    pub fn from_env(token_expiry: i64, issuer: Option<String>) -> Self {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        Self::from_secret(secret.as_bytes(), token_expiry, issuer)
    }

    pub fn from_secret(secret: &[u8], token_expiry: i64, issuer: Option<String>) -> Self {
        Self {
            key: HS256Key::from_bytes(secret),
            token_expiry,
            issuer,
        }
    }

    pub fn generate_token(
        &self,
        user_id: Uuid,
        email: &str,
        roles: Vec<String>,
    ) -> Result<String, jwt_simple::Error> {
        let custom_claims = AccessClaims {
            email: email.to_string(),
            roles,
        };

        let mut claims = jwt_simple::claims::Claims::with_custom_claims(
            custom_claims,
            Duration::from_secs(self.token_expiry as u64),
        )
        .with_subject(user_id.to_string());

        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }

        self.key.authenticate(claims)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jwt_simple::Error> {
        let mut options = VerificationOptions::default();
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(std::collections::HashSet::from([issuer.clone()]));
        }

        let token_data = self.key.verify_token::<AccessClaims>(token, Some(options))?;

        Ok(Claims {
            sub: token_data.subject.unwrap_or_default(),
            email: token_data.custom.email,
            roles: token_data.custom.roles,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            iat: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::from_secret(b"test-signing-secret", 3600, None)
    }

    #[test]
    fn test_generate_and_verify_token() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token = config
            .generate_token(
                user_id,
                "inspector@example.com",
                vec!["inspector".to_string()],
            )
            .expect("Token generation should succeed");

        let claims = config
            .verify_token(&token)
            .expect("Token verification should succeed");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "inspector@example.com");
        assert_eq!(claims.roles, vec!["inspector".to_string()]);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_invalid_token_fails_verification() {
        let config = test_config();
        assert!(config.verify_token("not.a.token").is_err());
    }

    #[test]
    fn test_wrong_secret_fails_verification() {
        let config = test_config();
        let other = JwtConfig::from_secret(b"another-secret", 3600, None);

        let token = config
            .generate_token(Uuid::new_v4(), "a@b.com", vec![])
            .expect("Token generation should succeed");

        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn test_issuer_is_enforced() {
        let signer = JwtConfig::from_secret(b"secret", 3600, Some("bitacora".to_string()));
        let verifier = JwtConfig::from_secret(b"secret", 3600, Some("someone-else".to_string()));

        let token = signer
            .generate_token(Uuid::new_v4(), "a@b.com", vec![])
            .expect("Token generation should succeed");

        assert!(signer.verify_token(&token).is_ok());
        assert!(verifier.verify_token(&token).is_err());
    }
}
