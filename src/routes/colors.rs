use axum::{Json, Router, routing::get};

use crate::{response::ApiResponse, services::product_service, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_colors))
}

#[utoipa::path(
    get,
    path = "/api/colors",
    responses(
        (status = 200, description = "Catalog color palette", body = ApiResponse<Vec<String>>)
    ),
    tag = "Colors"
)]
pub async fn list_colors() -> Json<ApiResponse<Vec<String>>> {
    Json(product_service::list_colors())
}
