use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::telegram::{
        BroadcastResult, ChannelMessageRequest, MessageRequest, SendProductsRequest,
        SendProductsResult, SendResult, TelegramStatus,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::telegram_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/broadcast", post(broadcast))
        .route("/send/{chat_id}", post(send_message))
        .route("/channel", post(post_to_channel))
        .route("/send-products", post(send_products))
        .route("/status", get(status))
}

#[utoipa::path(
    post,
    path = "/api/telegram/broadcast",
    request_body = MessageRequest,
    responses(
        (status = 200, description = "Number of chats reached", body = ApiResponse<BroadcastResult>),
        (status = 400, description = "Empty message")
    ),
    security(("bearer_auth" = [])),
    tag = "Telegram"
)]
pub async fn broadcast(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<MessageRequest>,
) -> AppResult<Json<ApiResponse<BroadcastResult>>> {
    let resp = telegram_service::broadcast_message(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/telegram/send/{chat_id}",
    params(
        ("chat_id" = i64, Path, description = "Telegram chat ID")
    ),
    request_body = MessageRequest,
    responses(
        (status = 200, description = "Delivery result", body = ApiResponse<SendResult>),
        (status = 400, description = "Empty message")
    ),
    security(("bearer_auth" = [])),
    tag = "Telegram"
)]
pub async fn send_message(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(chat_id): Path<i64>,
    Json(payload): Json<MessageRequest>,
) -> AppResult<Json<ApiResponse<SendResult>>> {
    let resp = telegram_service::send_message(&state, chat_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/telegram/channel",
    request_body = ChannelMessageRequest,
    responses(
        (status = 200, description = "Channel post result", body = ApiResponse<SendResult>),
        (status = 400, description = "Empty message")
    ),
    security(("bearer_auth" = [])),
    tag = "Telegram"
)]
pub async fn post_to_channel(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<ChannelMessageRequest>,
) -> AppResult<Json<ApiResponse<SendResult>>> {
    let resp = telegram_service::post_to_channel(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/telegram/send-products",
    request_body = SendProductsRequest,
    responses(
        (status = 200, description = "Products posted to the channel", body = ApiResponse<SendProductsResult>),
        (status = 400, description = "No products selected")
    ),
    security(("bearer_auth" = [])),
    tag = "Telegram"
)]
pub async fn send_products(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<SendProductsRequest>,
) -> AppResult<Json<ApiResponse<SendProductsResult>>> {
    let resp = telegram_service::send_products(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/telegram/status",
    responses(
        (status = 200, description = "Bot configuration and recipient count", body = ApiResponse<TelegramStatus>)
    ),
    security(("bearer_auth" = [])),
    tag = "Telegram"
)]
pub async fn status(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<TelegramStatus>>> {
    let resp = telegram_service::status(&state).await?;
    Ok(Json(resp))
}
