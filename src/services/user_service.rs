use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::users::{
        AdminCheckResponse, ChangePasswordRequest, CreateUserRequest, LinkTelegramRequest,
        TelegramRegisterRequest, UpdateUserRequest, UserList,
    },
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{User, user_from_entity},
    response::{ApiResponse, Meta},
    services::auth_service::{hash_password, verify_password},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn find_user(state: &AppState, id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn ensure_telegram_free(
    state: &AppState,
    telegram_user_id: i64,
    owner: Option<Uuid>,
) -> AppResult<()> {
    let holder = Users::find()
        .filter(UserCol::TelegramUserId.eq(telegram_user_id))
        .one(&state.orm)
        .await?;
    match holder {
        Some(other) if Some(other.id) != owner => Err(AppError::Conflict(format!(
            "Telegram user {telegram_user_id} is already linked to {}",
            other.username
        ))),
        _ => Ok(()),
    }
}

pub async fn list_users(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let items: Vec<User> = Users::find()
        .order_by_asc(UserCol::Username)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success("Users", UserList { items }, Some(Meta::new(1, total, total))))
}

pub async fn get_user(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let found = find_user(state, id).await?;
    Ok(ApiResponse::success("User", user_from_entity(found), Some(Meta::empty())))
}

pub async fn create_user(
    state: &AppState,
    user: &AuthUser,
    payload: CreateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let username = payload.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::bad_request("Username is required"));
    }
    validate_password(&payload.password)?;

    let exists = Users::find()
        .filter(UserCol::Username.eq(username.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("Username is already taken".into()));
    }
    if let Some(telegram_user_id) = payload.telegram_user_id {
        ensure_telegram_free(state, telegram_user_id, None).await?;
    }

    let created = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        password_hash: Set(hash_password(&payload.password)?),
        email: Set(optional(payload.email)),
        full_name: Set(optional(payload.full_name)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        is_admin: Set(payload.is_admin.unwrap_or(false)),
        telegram_user_id: Set(payload.telegram_user_id),
        last_login_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "user_create",
        "users",
        json!({ "user_id": created.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User created",
        user_from_entity(created),
        Some(Meta::empty()),
    ))
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let existing = find_user(state, id).await?;
    if existing.id == user.user_id
        && (payload.is_active == Some(false) || payload.is_admin == Some(false))
    {
        return Err(AppError::bad_request("You cannot deactivate or demote yourself"));
    }

    let mut active: UserActive = existing.into();
    if payload.email.is_some() {
        active.email = Set(optional(payload.email));
    }
    if payload.full_name.is_some() {
        active.full_name = Set(optional(payload.full_name));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(is_admin) = payload.is_admin {
        active.is_admin = Set(is_admin);
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "user_update",
        "users",
        json!({ "user_id": updated.id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", user_from_entity(updated), Some(Meta::empty())))
}

pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if id == user.user_id {
        return Err(AppError::bad_request("You cannot delete yourself"));
    }
    let result = Users::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(&state.pool, user.user_id, "user_delete", "users", json!({ "user_id": id })).await;

    Ok(ApiResponse::success("Deleted", json!({}), Some(Meta::empty())))
}

/// Admins may reset any password; others change their own with the current one.
pub async fn change_password(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if !user.is_admin && user.user_id != id {
        return Err(AppError::Forbidden);
    }
    validate_password(&payload.new_password)?;
    let existing = find_user(state, id).await?;

    if !user.is_admin {
        let current = payload
            .current_password
            .as_deref()
            .ok_or_else(|| AppError::bad_request("Current password is required"))?;
        if !verify_password(current, &existing.password_hash)? {
            return Err(AppError::bad_request("Current password is incorrect"));
        }
    }

    let mut active: UserActive = existing.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    audit::record(&state.pool, user.user_id, "user_password", "users", json!({ "user_id": id })).await;

    Ok(ApiResponse::success("Password changed", json!({}), Some(Meta::empty())))
}

pub async fn link_telegram(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: LinkTelegramRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let existing = find_user(state, id).await?;
    if let Some(telegram_user_id) = payload.telegram_user_id {
        ensure_telegram_free(state, telegram_user_id, Some(existing.id)).await?;
    }

    let mut active: UserActive = existing.into();
    active.telegram_user_id = Set(payload.telegram_user_id);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "user_telegram_link",
        "users",
        json!({ "user_id": updated.id, "telegram_user_id": updated.telegram_user_id }),
    )
    .await;

    Ok(ApiResponse::success("Telegram linked", user_from_entity(updated), Some(Meta::empty())))
}

/// Called by the bot on /start: find or create a notification-only user.
pub async fn register_telegram(
    state: &AppState,
    payload: TelegramRegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let existing = Users::find()
        .filter(UserCol::TelegramUserId.eq(payload.telegram_user_id))
        .one(&state.orm)
        .await?;
    if let Some(found) = existing {
        return Ok(ApiResponse::success("Already registered", user_from_entity(found), Some(Meta::empty())));
    }

    // Random password: these identities only receive notifications.
    let created = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(format!("tg_{}", payload.telegram_user_id)),
        password_hash: Set(hash_password(&Uuid::new_v4().to_string())?),
        email: Set(None),
        full_name: Set(optional(payload.full_name)),
        is_active: Set(true),
        is_admin: Set(false),
        telegram_user_id: Set(Some(payload.telegram_user_id)),
        last_login_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(telegram_user_id = payload.telegram_user_id, "telegram subscriber registered");
    Ok(ApiResponse::success("Registered", user_from_entity(created), Some(Meta::empty())))
}

pub async fn is_telegram_admin(
    state: &AppState,
    telegram_user_id: i64,
) -> AppResult<ApiResponse<AdminCheckResponse>> {
    let found = Users::find()
        .filter(UserCol::TelegramUserId.eq(telegram_user_id))
        .one(&state.orm)
        .await?;
    let is_admin = found.is_some_and(|u| u.is_active && u.is_admin);
    Ok(ApiResponse::success(
        "Admin check",
        AdminCheckResponse {
            telegram_user_id,
            is_admin,
        },
        Some(Meta::empty()),
    ))
}
