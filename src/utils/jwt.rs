use crate::error::{AppError, AppResult};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims issued by the hosted auth provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id (uuid)
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

/// The authenticated caller, stored in request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // hosted auth tokens carry an audience we do not pin
        validation.validate_aud = false;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<AuthUser> {
        let claims = self.verify_token(token)?;

        if claims.role.as_deref() == Some("anon") {
            return Err(AppError::AuthError("Anonymous tokens are not accepted".to_string()));
        }

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::AuthError("Invalid subject in access token".to_string()))?;

        Ok(AuthUser {
            id,
            email: claims.email.unwrap_or_default(),
            is_admin: claims.app_metadata.role.as_deref() == Some("admin"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, role: Option<&str>, admin: bool, exp_offset: i64) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            email: Some("buyer@example.com".to_string()),
            role: role.map(str::to_string),
            app_metadata: AppMetadata {
                role: admin.then(|| "admin".to_string()),
            },
            exp: (now + Duration::seconds(exp_offset)).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_access_token() {
        let id = Uuid::new_v4();
        let svc = JwtService::new(SECRET);
        let user = svc
            .verify_access_token(&token(&id.to_string(), Some("authenticated"), false, 3600))
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "buyer@example.com");
        assert!(!user.is_admin);
    }

    #[test]
    fn test_admin_flag_from_app_metadata() {
        let svc = JwtService::new(SECRET);
        let user = svc
            .verify_access_token(&token(&Uuid::new_v4().to_string(), None, true, 3600))
            .unwrap();
        assert!(user.is_admin);
    }

    #[test]
    fn test_rejects_expired_and_anon_tokens() {
        let svc = JwtService::new(SECRET);
        let id = Uuid::new_v4().to_string();
        assert!(svc.verify_access_token(&token(&id, None, false, -3600)).is_err());
        assert!(
            svc.verify_access_token(&token(&id, Some("anon"), false, 3600))
                .is_err()
        );
        assert!(
            svc.verify_access_token(&token("not-a-uuid", None, false, 3600))
                .is_err()
        );
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let svc = JwtService::new("other-secret");
        let id = Uuid::new_v4().to_string();
        assert!(svc.verify_access_token(&token(&id, None, false, 3600)).is_err());
    }
}
