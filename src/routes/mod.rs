use axum::Router;

use crate::state::AppState;

pub mod announcements;
pub mod auth;
pub mod brands;
pub mod cart;
pub mod colors;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod telegram;
pub mod telegram_errors;
pub mod users;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/users", users::router())
        .nest("/announcements", announcements::router())
        .nest("/brands", brands::router())
        .nest("/colors", colors::router())
        .nest("/telegram", telegram::router())
        .nest("/telegram-errors", telegram_errors::router())
}
