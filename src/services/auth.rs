//! Account registration, login and token validation

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Duration;
use mockable::Clock;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{
        AuthResponse, LoginRequest, NewUser, RegisterRequest, RegisterResponse, User, UserClaims,
    },
    repository::Store,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self { store, config, clock }
    }

    /// Create an account; the email doubles as the login name
    pub async fn register(&self, request: RegisterRequest) -> AppResult<RegisterResponse> {
        request.validate()?;

        if self.store.find_user_by_email(&request.email).await?.is_some() {
            return Err(AppError::Validation(
                "User with this email already exists".to_string(),
            ));
        }

        let user = self
            .store
            .insert_user(&NewUser {
                email: request.email.clone(),
                password_hash: hash_password(&request.password)?,
                roles: Vec::new(),
            })
            .await?;

        tracing::info!(user_id = user.id, "New user registered: {}", user.email);

        Ok(RegisterResponse {
            message: "User registered successfully".to_string(),
            email: user.email,
        })
    }

    /// Authenticate by email and password and return a JWT token
    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        request.validate()?;

        let user = match self.store.find_user_by_email(&request.email).await? {
            Some(user) => user,
            None => {
                tracing::warn!("Failed login attempt for unknown email: {}", request.email);
                return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !verify_password(&user, &request.password)? {
            tracing::warn!(user_id = user.id, "Failed login attempt: wrong password");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        let response = self.issue_token(user)?;
        tracing::info!("User logged in: {}", response.email);
        Ok(response)
    }

    /// Decode and check a bearer token
    pub fn validate_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
    }

    fn issue_token(&self, user: User) -> AppResult<AuthResponse> {
        let now = self.clock.utc();
        let expires_at = now + Duration::minutes(self.config.jwt_expiration_minutes);

        let claims = UserClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            roles: user.roles.clone(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(AuthResponse {
            token,
            expires_at,
            email: user.email,
            roles: user.roles,
        })
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use mockable::DefaultClock;

    fn service() -> AuthService {
        let config = AuthConfig {
            jwt_secret: "unit-test-secret".to_string(),
            ..AuthConfig::default()
        };
        AuthService::new(Arc::new(MemoryStore::new()), config, Arc::new(DefaultClock))
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "hunter22".to_string(),
            confirm_password: "hunter22".to_string(),
        }
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        let user = User {
            id: 1,
            email: "a@example.com".to_string(),
            password_hash: hash,
            roles: Vec::new(),
            created_at: chrono::Utc::now(),
        };
        assert!(verify_password(&user, "correct horse").unwrap());
        assert!(!verify_password(&user, "wrong").unwrap());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service();
        let registered = service.register(register_request("reader@example.com")).await.unwrap();
        assert_eq!(registered.message, "User registered successfully");

        let auth = service
            .login(LoginRequest {
                email: "reader@example.com".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap();
        let claims = service.validate_token(&auth.token).unwrap();
        assert_eq!(claims.email, "reader@example.com");
        assert_eq!(claims.iss, "CoolLibrary");
        assert_eq!(claims.exp, auth.expires_at.timestamp());
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let service = service();
        service.register(register_request("dup@example.com")).await.unwrap();

        let err = service.register(register_request("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "User with this email already exists"));
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let service = service();
        service.register(register_request("reader@example.com")).await.unwrap();

        let err = service
            .login(LoginRequest {
                email: "reader@example.com".to_string(),
                password: "not-the-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authentication(msg) if msg == INVALID_CREDENTIALS));
    }
}
