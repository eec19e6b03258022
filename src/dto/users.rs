use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::User;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub telegram_user_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    /// Required when users change their own password.
    pub current_password: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkTelegramRequest {
    /// `null` unlinks.
    pub telegram_user_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TelegramRegisterRequest {
    pub telegram_user_id: i64,
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminCheckResponse {
    pub telegram_user_id: i64,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<User>,
}
