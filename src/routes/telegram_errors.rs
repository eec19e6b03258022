use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::telegram::TelegramErrorList,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::telegram_error_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_errors))
        .route("/all", delete(delete_all_errors))
        .route("/{id}", delete(delete_error))
}

#[utoipa::path(
    get,
    path = "/api/telegram-errors",
    responses(
        (status = 200, description = "Failed channel sends grouped by day", body = ApiResponse<TelegramErrorList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Telegram"
)]
pub async fn list_errors(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<TelegramErrorList>>> {
    let resp = telegram_error_service::list_errors(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/telegram-errors/{id}",
    params(
        ("id" = Uuid, Path, description = "Error entry ID")
    ),
    responses(
        (status = 200, description = "Entry deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Telegram"
)]
pub async fn delete_error(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = telegram_error_service::delete_error(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/telegram-errors/all",
    responses(
        (status = 200, description = "Log cleared", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Telegram"
)]
pub async fn delete_all_errors(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = telegram_error_service::delete_all_errors(&state).await?;
    Ok(Json(resp))
}
