//! User account model, authentication requests and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::config::AuthConfig;

/// Account allowed to call protected endpoints
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Account about to be persisted
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Used as the login name
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// Registration response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub email: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Send as `Authorization: Bearer {token}`
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub email: String,
    pub roles: Vec<String>,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id
    pub sub: String,
    pub email: String,
    /// Unique token id
    pub jti: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and validate a JWT token (signature, expiry, issuer, audience)
    pub fn from_token(token: &str, config: &AuthConfig) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let mut validation = Validation::default();
        validation.set_issuer(&[config.jwt_issuer.as_str()]);
        validation.set_audience(&[config.jwt_audience.as_str()]);

        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &validation,
        )?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            ..AuthConfig::default()
        }
    }

    fn claims(config: &AuthConfig, exp_offset: i64) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "42".to_string(),
            email: "reader@example.com".to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            roles: vec!["Librarian".to_string()],
            iss: config.jwt_issuer.clone(),
            aud: config.jwt_audience.clone(),
            exp: now + exp_offset,
            iat: now,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let config = auth_config();
        let original = claims(&config, 3600);
        let token = original.create_token(&config.jwt_secret).unwrap();

        let parsed = UserClaims::from_token(&token, &config).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_token_with_wrong_audience_is_rejected() {
        let config = auth_config();
        let token = claims(&config, 3600).create_token(&config.jwt_secret).unwrap();

        let other = AuthConfig {
            jwt_audience: "SomeoneElse".to_string(),
            ..auth_config()
        };
        assert!(UserClaims::from_token(&token, &other).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = auth_config();
        let token = claims(&config, -3600).create_token(&config.jwt_secret).unwrap();
        assert!(UserClaims::from_token(&token, &config).is_err());
    }

    #[test]
    fn test_register_validation() {
        let request = RegisterRequest {
            email: "new@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret2".to_string(),
        };
        assert!(request.validate().is_err());

        let request = RegisterRequest {
            email: "new@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        };
        assert!(request.validate().is_ok());

        let request = RegisterRequest {
            email: "new@example.com".to_string(),
            password: "short".to_string(),
            confirm_password: "short".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
