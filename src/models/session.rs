use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{BackendConfig, SessionConfig};

/// An opaque, time-limited credential bound to one uid.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct SessionCredential(String);

impl SessionCredential {
    pub fn new(token: impl Into<String>) -> Self {
        SessionCredential(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep credentials out of debug logs.
impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential(..)")
    }
}

/// JWT payload of a session credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub uid: String,
    /// `provider` and `provider_id` for provider logins; empty for native ones.
    #[serde(default)]
    pub claims: HashMap<String, String>,
}

/// Mints and verifies session credentials with the backend service-account keys.
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl_seconds: i64,
}

impl SessionIssuer {
    pub fn new(backend: &BackendConfig, session: &SessionConfig) -> Result<Self, String> {
        backend.validate()?;
        let encoding_key = EncodingKey::from_rsa_pem(backend.private_key_pem().as_bytes())
            .map_err(|e| format!("Invalid backend private key: {}", e))?;
        let decoding_key = DecodingKey::from_rsa_pem(backend.public_key_pem().as_bytes())
            .map_err(|e| format!("Invalid backend public key: {}", e))?;

        Ok(SessionIssuer {
            encoding_key,
            decoding_key,
            issuer: backend.client_email.clone(),
            audience: session.audience.clone(),
            ttl_seconds: session.ttl_seconds,
        })
    }

    /// Signs a credential for `uid`, embedding the extra claims as given.
    pub fn mint(
        &self,
        uid: &str,
        claims: HashMap<String, String>,
    ) -> Result<SessionCredential, String> {
        let now = Utc::now().timestamp();
        let payload = SessionClaims {
            iss: self.issuer.clone(),
            sub: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + self.ttl_seconds,
            uid: uid.to_string(),
            claims,
        };
        encode(&Header::new(Algorithm::RS256), &payload, &self.encoding_key)
            .map(SessionCredential)
            .map_err(|e| format!("Failed to sign session credential: {}", e))
    }

    /// Checks signature, issuer, audience and expiry.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, String> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| format!("Invalid session credential: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> BackendConfig {
        BackendConfig {
            project_id: "wishtree-test".to_string(),
            client_email: "svc@wishtree-test.iam".to_string(),
            private_key: include_str!("../../tests/fixtures/session_private.pem").to_string(),
            public_key: include_str!("../../tests/fixtures/session_public.pem").to_string(),
        }
    }

    fn issuer_with_ttl(ttl_seconds: i64) -> SessionIssuer {
        let session = SessionConfig {
            ttl_seconds,
            ..SessionConfig::default()
        };
        SessionIssuer::new(&backend(), &session).expect("test keys are valid")
    }

    #[test]
    fn test_mint_and_verify() {
        let issuer = issuer_with_ttl(3600);
        let mut extra = HashMap::new();
        extra.insert("provider".to_string(), "kakao".to_string());
        extra.insert("provider_id".to_string(), "42".to_string());

        let credential = issuer.mint("kakao:42", extra).unwrap();
        let claims = issuer.verify(credential.as_str()).unwrap();

        assert_eq!(claims.uid, "kakao:42");
        assert_eq!(claims.iss, "svc@wishtree-test.iam");
        assert_eq!(claims.aud, "wishtree");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.claims["provider"], "kakao");
    }

    #[test]
    fn test_expired_credential_is_rejected() {
        let issuer = issuer_with_ttl(-60);
        let credential = issuer.mint("native-user", HashMap::new()).unwrap();
        assert!(issuer.verify(credential.as_str()).is_err());
    }

    #[test]
    fn test_tampered_credential_is_rejected() {
        let issuer = issuer_with_ttl(3600);
        let credential = issuer.mint("kakao:42", HashMap::new()).unwrap();
        let mut tampered = credential.as_str().to_string();
        tampered.push('x');
        assert!(issuer.verify(&tampered).is_err());
        assert!(issuer.verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_wrong_audience_is_rejected() {
        let issuer = issuer_with_ttl(3600);
        let other = SessionIssuer::new(
            &backend(),
            &SessionConfig {
                audience: "someone-else".to_string(),
                ..SessionConfig::default()
            },
        )
        .unwrap();
        let credential = other.mint("kakao:42", HashMap::new()).unwrap();
        assert!(issuer.verify(credential.as_str()).is_err());
    }

    #[test]
    fn test_invalid_keys_fail_construction() {
        let mut bad = backend();
        bad.private_key = "not a pem document".to_string();
        assert!(SessionIssuer::new(&bad, &SessionConfig::default()).is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let credential = SessionCredential::new("secret.jwt.value");
        assert_eq!(format!("{:?}", credential), "SessionCredential(..)");
    }
}
