use axum::{extract::FromRequestParts, http::header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    config::JwtConfig,
    dto::auth::Claims,
    entity::users::{Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if !user.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Sign a token for `user`; returns the token and its expiry.
pub fn issue_token(
    config: &JwtConfig,
    user: &UserModel,
) -> AppResult<(String, chrono::DateTime<Utc>)> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(Duration::hours(config.ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        name: user.username.clone(),
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok((token, expires_at))
}

/// Check signature, issuer, audience and expiry.
pub fn decode_token(config: &JwtConfig, token: &str) -> AppResult<Claims> {
    let mut validation = Validation::default();
    validation.set_issuer(&[config.issuer.as_str()]);
    validation.set_audience(&[config.audience.as_str()]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// Decode the token and re-load its user, who must still be active.
pub async fn validate_token(state: &AppState, token: &str) -> AppResult<UserModel> {
    let claims = decode_token(&state.config.jwt, token)?;
    Users::find()
        .filter(UserCol::Username.eq(claims.name.as_str()))
        .filter(UserCol::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized)?;

        let auth_str = auth_header.to_str().map_err(|_| AppError::Unauthorized)?;
        let token = bearer_token(auth_str).ok_or(AppError::Unauthorized)?;

        let user = validate_token(state, token).await?;
        Ok(AuthUser {
            user_id: user.id,
            username: user.username,
            is_admin: user.is_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".into(),
            issuer: "resale-shop-api".into(),
            audience: "resale-shop-client".into(),
            ttl_hours: 168,
        }
    }

    fn user() -> UserModel {
        let now = Utc::now().fixed_offset();
        UserModel {
            id: Uuid::new_v4(),
            username: "admin".into(),
            password_hash: String::new(),
            email: None,
            full_name: Some("Shop Admin".into()),
            is_active: true,
            is_admin: true,
            telegram_user_id: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issued_tokens_decode_with_same_config() {
        let config = jwt_config();
        let user = user();
        let (token, expires_at) = issue_token(&config, &user).unwrap();

        let claims = decode_token(&config, &token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.name, "admin");
        assert_eq!(claims.exp, expires_at.timestamp() as usize);
        assert!(expires_at > Utc::now() + Duration::days(6));
    }

    #[test]
    fn wrong_audience_or_secret_is_rejected() {
        let config = jwt_config();
        let (token, _) = issue_token(&config, &user()).unwrap();

        let other_audience = JwtConfig {
            audience: "someone-else".into(),
            ..jwt_config()
        };
        assert!(matches!(
            decode_token(&other_audience, &token),
            Err(AppError::Unauthorized)
        ));

        let other_secret = JwtConfig {
            secret: "other".into(),
            ..jwt_config()
        };
        assert!(decode_token(&other_secret, &token).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer   "), None);
    }

    #[test]
    fn admin_guard() {
        let mut auth = AuthUser {
            user_id: Uuid::new_v4(),
            username: "clerk".into(),
            is_admin: false,
        };
        assert!(matches!(ensure_admin(&auth), Err(AppError::Forbidden)));
        auth.is_admin = true;
        assert!(ensure_admin(&auth).is_ok());
    }
}
