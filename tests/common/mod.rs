#![allow(dead_code)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use resale_shop_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        products::ActiveModel as ProductActive,
        users::{ActiveModel as UserActive, Model as UserModel},
    },
    middleware::auth::AuthUser,
    services::auth_service::hash_password,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use uuid::Uuid;

pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
            None
        }
    }
}

pub fn config(database_url: &str, extra: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
    let mut values: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".to_string(), database_url.to_string()),
        ("JWT_SECRET".to_string(), "integration-secret".to_string()),
    ]);
    for (key, value) in extra {
        values.insert(key.to_string(), value.to_string());
    }
    AppConfig::from_lookup(move |key| values.get(key).cloned())
}

/// State over the test database with migrations applied; `None` when no
/// database is configured.
pub async fn test_state(extra: &[(&str, &str)]) -> anyhow::Result<Option<AppState>> {
    let Some(url) = database_url() else {
        return Ok(None);
    };
    let (pool, orm) = create_orm_conn(&url).await?;
    run_migrations(&orm).await?;
    Ok(Some(AppState::new(pool, config(&url, extra)?)))
}

pub async fn create_product(
    state: &AppState,
    stock: i32,
    price: i64,
    published_at: Option<DateTime<Utc>>,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test dress {}", Uuid::new_v4().simple())),
        brand: Set(Some("Test brand".into())),
        description: Set(None),
        price: Set(price),
        size: Set(Some("110".into())),
        color: Set(Some("Белый".into())),
        images: Set(json!([])),
        quantity_in_stock: Set(stock),
        gender: Set(Some("girl".into())),
        condition: Set(Some("Отличное".into())),
        published_at: Set(published_at.map(Into::into)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

pub async fn create_admin(state: &AppState) -> anyhow::Result<AuthUser> {
    let user = create_user(state, true).await?;
    Ok(AuthUser {
        user_id: user.id,
        username: user.username,
        is_admin: true,
    })
}

/// Active account with a unique username.
pub async fn create_user(state: &AppState, is_admin: bool) -> anyhow::Result<UserModel> {
    let prefix = if is_admin { "admin" } else { "staff" };
    let username = format!("{prefix}_{}", Uuid::new_v4().simple());
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        password_hash: Set(hash_password("secret-pass")?),
        email: Set(None),
        full_name: Set(Some("Test User".into())),
        is_active: Set(true),
        is_admin: Set(is_admin),
        telegram_user_id: Set(None),
        last_login_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(user)
}

/// A Telegram id unlikely to collide with earlier runs.
pub fn random_telegram_id() -> i64 {
    let bytes = Uuid::new_v4().as_u128();
    (bytes >> 72) as i64 + 1_000_000
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let (stock,): (i32,) = sqlx::query_as("SELECT quantity_in_stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(stock)
}

/// Move a session's cart lines `minutes` into the past.
pub async fn age_cart(state: &AppState, session_id: &str, minutes: i64) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE cart_items SET updated_at = NOW() - make_interval(mins => $2) WHERE session_id = $1",
    )
    .bind(session_id)
    .bind(minutes as i32)
    .execute(&state.pool)
    .await?;
    Ok(())
}
