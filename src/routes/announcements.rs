use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::announcements::{AnnouncementList, CreateAnnouncementRequest, UnpublishedProductList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Announcement,
    response::ApiResponse,
    services::announcement_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_announcements).post(create_announcement))
        .route("/unpublished-products", get(unpublished_products))
        .route("/{id}", get(get_announcement).delete(delete_announcement))
}

#[utoipa::path(
    get,
    path = "/api/announcements",
    responses(
        (status = 200, description = "Announcements, newest first", body = ApiResponse<AnnouncementList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn list_announcements(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<AnnouncementList>>> {
    let resp = announcement_service::list_announcements(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/announcements",
    request_body = CreateAnnouncementRequest,
    responses(
        (status = 200, description = "Announcement scheduled", body = ApiResponse<Announcement>),
        (status = 400, description = "Missing message or time not in the future"),
        (status = 500, description = "Collage could not be built")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn create_announcement(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> AppResult<Json<ApiResponse<Announcement>>> {
    let resp = announcement_service::create_announcement(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/announcements/unpublished-products",
    responses(
        (status = 200, description = "Products scheduled for later, soonest first", body = ApiResponse<UnpublishedProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn unpublished_products(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<UnpublishedProductList>>> {
    let resp = announcement_service::unpublished_products(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/announcements/{id}",
    params(
        ("id" = Uuid, Path, description = "Announcement ID")
    ),
    responses(
        (status = 200, description = "Announcement", body = ApiResponse<Announcement>),
        (status = 404, description = "Announcement not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn get_announcement(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Announcement>>> {
    let resp = announcement_service::get_announcement(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/announcements/{id}",
    params(
        ("id" = Uuid, Path, description = "Announcement ID")
    ),
    responses(
        (status = 200, description = "Announcement deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Announcement not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn delete_announcement(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = announcement_service::delete_announcement(&state, &user, id).await?;
    Ok(Json(resp))
}
