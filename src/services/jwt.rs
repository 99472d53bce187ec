use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::JwtConfig,
    db::models::UserRole,
    error::{ApiError, ApiResult},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> ApiResult<Uuid> {
        Ok(self.sub.parse()?)
    }
}

#[derive(Clone)]
pub struct JwtService {
    secret: String,
    access_token_expiry: Duration,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            secret: config.secret,
            access_token_expiry: Duration::seconds(config.access_token_expiry as i64),
        }
    }

    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> ApiResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            exp: (now + self.access_token_expiry).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| ApiError::Internal(format!("Token encoding error: {}", e)))
    }

    pub fn verify_access_token(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| ApiError::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 3600,
        })
    }

    #[test]
    fn issued_token_round_trips() {
        let service = test_service();
        let user_id = Uuid::new_v4();
        let token = service
            .generate_access_token(user_id, "a@b.example", UserRole::Citizen)
            .unwrap();

        let claims = service.verify_access_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.role, UserRole::Citizen);
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let token = test_service()
            .generate_access_token(Uuid::new_v4(), "a@b.example", UserRole::Admin)
            .unwrap();

        let other = JwtService::new(JwtConfig {
            secret: "different".to_string(),
            access_token_expiry: 3600,
        });
        assert!(other.verify_access_token(&token).is_err());
    }
}
