use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::cart::{AddToCartRequest, CartList},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    inventory::{available_quantity, check_quantity_update, is_fresh, quantity_after_add, reservation_cutoff},
    models::{CartItem, json_strings},
    response::{ApiResponse, Meta},
    services::product_service::reserved_by_others,
    state::AppState,
};

#[derive(FromRow)]
struct CartWithProductRow {
    id: Uuid,
    session_id: String,
    product_id: Uuid,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    product_name: String,
    product_price: i64,
    product_brand: Option<String>,
    product_size: Option<String>,
    product_color: Option<String>,
    product_images: Value,
}

impl From<CartWithProductRow> for CartItem {
    fn from(row: CartWithProductRow) -> Self {
        CartItem {
            id: row.id,
            session_id: row.session_id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_price: row.product_price,
            product_brand: row.product_brand,
            product_size: row.product_size,
            product_color: row.product_color,
            product_images: json_strings(&row.product_images),
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const CART_VIEW_SELECT: &str = r#"
    SELECT ci.id, ci.session_id, ci.product_id, ci.quantity, ci.created_at, ci.updated_at,
           p.name AS product_name, p.price AS product_price, p.brand AS product_brand,
           p.size AS product_size, p.color AS product_color, p.images AS product_images
    FROM cart_items ci
    JOIN products p ON p.id = ci.product_id
"#;

fn require_session(session_id: Option<&str>) -> AppResult<String> {
    session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request("session_id is required"))
}

async fn fetch_view(pool: &DbPool, id: Uuid) -> AppResult<CartItem> {
    let sql = format!("{CART_VIEW_SELECT} WHERE ci.id = $1");
    let row = sqlx::query_as::<_, CartWithProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(row.into())
}

/// Fresh cart lines of a session, newest first.
pub async fn list_cart(state: &AppState, session_id: Option<&str>) -> AppResult<ApiResponse<CartList>> {
    let session_id = require_session(session_id)?;
    let cutoff = reservation_cutoff(Utc::now(), state.config.reservation_ttl());

    let sql = format!(
        "{CART_VIEW_SELECT} WHERE ci.session_id = $1 AND ci.updated_at > $2 ORDER BY ci.created_at DESC"
    );
    let rows = sqlx::query_as::<_, CartWithProductRow>(&sql)
        .bind(&session_id)
        .bind(cutoff)
        .fetch_all(&state.pool)
        .await?;

    let items: Vec<CartItem> = rows.into_iter().map(CartItem::from).collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        CartList::new(items),
        Some(Meta::new(1, total, total)),
    ))
}

/// Availability of `product_id` for `session_id`, with the product row locked
/// for the rest of the transaction.
async fn lock_and_measure<C>(
    conn: &C,
    product_id: Uuid,
    session_id: &str,
    cutoff: DateTime<Utc>,
) -> AppResult<i32>
where
    C: ConnectionTrait,
{
    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let reserved = reserved_by_others(conn, &[product_id], Some(session_id), cutoff)
        .await?
        .get(&product_id)
        .copied()
        .unwrap_or(0);
    Ok(available_quantity(product.quantity_in_stock, reserved))
}

pub async fn add_to_cart(
    state: &AppState,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let session_id = require_session(Some(payload.session_id.as_str()))?;
    if payload.quantity <= 0 {
        return Err(AppError::bad_request("Quantity must be greater than 0"));
    }

    let now = Utc::now();
    let ttl = state.config.reservation_ttl();
    let cutoff = reservation_cutoff(now, ttl);

    let txn = state.orm.begin().await?;
    let available = lock_and_measure(&txn, payload.product_id, &session_id, cutoff).await?;

    let existing = CartItems::find()
        .filter(CartCol::SessionId.eq(session_id.as_str()))
        .filter(CartCol::ProductId.eq(payload.product_id))
        .one(&txn)
        .await?;
    // A stale line no longer reserves anything; adding restarts it.
    let held = existing
        .as_ref()
        .filter(|row| is_fresh(row.updated_at.with_timezone(&Utc), now, ttl))
        .map(|row| row.quantity);

    let quantity = quantity_after_add(available, payload.quantity, held)?;

    let row = match existing {
        Some(row) => {
            let mut active: CartActive = row.into();
            active.quantity = Set(quantity);
            active.updated_at = Set(now.into());
            active.update(&txn).await?
        }
        None => {
            CartActive {
                id: Set(Uuid::new_v4()),
                session_id: Set(session_id.clone()),
                product_id: Set(payload.product_id),
                quantity: Set(quantity),
                created_at: NotSet,
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?
        }
    };
    txn.commit().await?;

    tracing::debug!(
        session_id = %session_id,
        product_id = %payload.product_id,
        quantity,
        available,
        "cart line reserved"
    );

    let item = fetch_view(&state.pool, row.id).await?;
    Ok(ApiResponse::success("Added to cart", item, Some(Meta::empty())))
}

pub async fn update_cart_item(
    state: &AppState,
    id: Uuid,
    quantity: i32,
) -> AppResult<ApiResponse<CartItem>> {
    if quantity <= 0 {
        return Err(AppError::bad_request("Quantity must be greater than 0"));
    }
    let now = Utc::now();
    let cutoff = reservation_cutoff(now, state.config.reservation_ttl());

    let txn = state.orm.begin().await?;
    let row = CartItems::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let available = lock_and_measure(&txn, row.product_id, &row.session_id, cutoff).await?;
    let quantity = check_quantity_update(available, quantity)?;

    let mut active: CartActive = row.into();
    active.quantity = Set(quantity);
    active.updated_at = Set(now.into());
    let row = active.update(&txn).await?;
    txn.commit().await?;

    let item = fetch_view(&state.pool, row.id).await?;
    Ok(ApiResponse::success("Updated", item, Some(Meta::empty())))
}

pub async fn remove_cart_item(
    state: &AppState,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(ApiResponse::success(
        "Removed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    session_id: Option<&str>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let session_id = require_session(session_id)?;
    let result = CartItems::delete_many()
        .filter(CartCol::SessionId.eq(session_id.as_str()))
        .exec(&state.orm)
        .await?;
    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({ "removed": result.rows_affected }),
        Some(Meta::empty()),
    ))
}

/// Physically remove lines that are no longer fresh at `cutoff`.
pub async fn delete_stale<C>(conn: &C, cutoff: DateTime<Utc>) -> AppResult<u64>
where
    C: ConnectionTrait,
{
    let result = CartItems::delete_many()
        .filter(CartCol::UpdatedAt.lte(cutoff))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
