use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{ProductInput, ProductList},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    inventory::{available_quantity, reservation_cutoff},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, product_from_entity},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

const MAX_NAME_LEN: usize = 200;

/// Visible to shoppers: no publish time, or one already reached.
pub fn visible_condition(now: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(Column::PublishedAt.is_null())
        .add(Column::PublishedAt.lte(now))
}

/// Units of each product held by fresh cart rows of sessions other than `session_id`.
pub async fn reserved_by_others<C>(
    conn: &C,
    product_ids: &[Uuid],
    session_id: Option<&str>,
    cutoff: DateTime<Utc>,
) -> AppResult<HashMap<Uuid, i64>>
where
    C: ConnectionTrait,
{
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut condition = Condition::all()
        .add(CartCol::ProductId.is_in(product_ids.iter().copied()))
        .add(CartCol::UpdatedAt.gt(cutoff));
    if let Some(session_id) = session_id {
        condition = condition.add(CartCol::SessionId.ne(session_id));
    }

    let rows: Vec<(Uuid, Option<i64>)> = CartItems::find()
        .select_only()
        .column(CartCol::ProductId)
        .column_as(Expr::col(CartCol::Quantity).sum().cast_as("bigint"), "reserved")
        .filter(condition)
        .group_by(CartCol::ProductId)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id, reserved)| (id, reserved.unwrap_or(0)))
        .collect())
}

async fn with_availability(
    state: &AppState,
    models: Vec<ProductModel>,
    session_id: Option<&str>,
) -> AppResult<Vec<Product>> {
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let cutoff = reservation_cutoff(Utc::now(), state.config.reservation_ttl());
    let reserved = reserved_by_others(&state.orm, &ids, session_id, cutoff).await?;

    Ok(models
        .into_iter()
        .map(|model| {
            let held = reserved.get(&model.id).copied().unwrap_or(0);
            let available = available_quantity(model.quantity_in_stock, held);
            product_from_entity(model, available)
        })
        .collect())
}

fn session_filter(session_id: Option<&String>) -> Option<&str> {
    session_id.map(|s| s.trim()).filter(|s| !s.is_empty())
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(visible_condition(Utc::now()));

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern.clone()))
                .add(Expr::col(Column::Brand).ilike(pattern)),
        );
    }
    if let Some(brand) = query.brand.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(Column::Brand).ilike(brand.clone()));
    }
    if let Some(gender) = query.gender.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Gender.eq(gender.clone()));
    }
    if let Some(size) = query.size.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Size.eq(size.clone()));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_availability(state, models, session_filter(query.session_id.as_ref())).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(
    state: &AppState,
    id: Uuid,
    session_id: Option<String>,
) -> AppResult<ApiResponse<Product>> {
    let model = Products::find_by_id(id)
        .filter(visible_condition(Utc::now()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let product = with_availability(state, vec![model], session_filter(session_id.as_ref()))
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product, None))
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::bad_request(format!(
            "Name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::bad_request("Price must not be negative"));
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    input: ProductInput,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let name = clean(input.name).unwrap_or_default();
    validate_name(&name)?;
    let price = input
        .price
        .ok_or_else(|| AppError::bad_request("Price is required"))?;
    validate_price(price)?;

    // Second-hand items are usually unique pieces.
    let stock = input.quantity_in_stock.filter(|q| *q > 0).unwrap_or(1);
    let images = input.images.unwrap_or_default();

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        brand: Set(clean(input.brand)),
        description: Set(clean(input.description)),
        price: Set(price),
        size: Set(clean(input.size)),
        color: Set(clean(input.color)),
        images: Set(json!(images)),
        quantity_in_stock: Set(stock),
        gender: Set(clean(input.gender)),
        condition: Set(clean(input.condition)),
        published_at: Set(input.published_at.map(Into::into)),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        json!({ "product_id": product.id }),
    )
    .await;
    tracing::info!(product_id = %product.id, published_at = ?product.published_at, "product created");

    let stock = product.quantity_in_stock;
    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product, stock),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    input: ProductInput,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = input.name {
        let name = name.trim().to_string();
        validate_name(&name)?;
        active.name = Set(name);
    }
    if let Some(price) = input.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(stock) = input.quantity_in_stock.filter(|q| *q > 0) {
        active.quantity_in_stock = Set(stock);
    }
    if input.brand.is_some() {
        active.brand = Set(clean(input.brand));
    }
    if input.description.is_some() {
        active.description = Set(clean(input.description));
    }
    if input.size.is_some() {
        active.size = Set(clean(input.size));
    }
    if input.color.is_some() {
        active.color = Set(clean(input.color));
    }
    if input.gender.is_some() {
        active.gender = Set(clean(input.gender));
    }
    if input.condition.is_some() {
        active.condition = Set(clean(input.condition));
    }
    if input.clear_published_at {
        active.published_at = Set(None);
    } else if let Some(published_at) = input.published_at {
        active.published_at = Set(Some(published_at.into()));
    }
    if let Some(images) = input.images {
        active.images = Set(json!(images));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        json!({ "product_id": product.id }),
    )
    .await;

    let items = with_availability(state, vec![product], None).await?;
    let product = items.into_iter().next().ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        json!({}),
        Some(Meta::empty()),
    ))
}

/// Make a product visible right away.
pub async fn publish_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let mut active: ActiveModel = existing.into();
    active.published_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_publish",
        "products",
        json!({ "product_id": product.id }),
    )
    .await;

    let items = with_availability(state, vec![product], None).await?;
    let product = items.into_iter().next().ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Published", product, Some(Meta::empty())))
}

/// Every product regardless of publish time, newest first.
pub async fn list_all_products(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();
    let finder = Products::find().order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_availability(state, models, None).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

/// Products scheduled for the future, soonest first.
pub async fn list_unpublished(state: &AppState) -> AppResult<Vec<Product>> {
    let models = Products::find()
        .filter(Column::PublishedAt.gt(Utc::now()))
        .order_by_asc(Column::PublishedAt)
        .all(&state.orm)
        .await?;
    with_availability(state, models, None).await
}

/// Products whose publish time passed within the trailing `window`.
pub async fn list_ready_for_publication<C>(
    conn: &C,
    now: DateTime<Utc>,
    window: Duration,
) -> AppResult<Vec<ProductModel>>
where
    C: ConnectionTrait,
{
    let products = Products::find()
        .filter(Column::PublishedAt.is_not_null())
        .filter(Column::PublishedAt.lte(now))
        .filter(Column::PublishedAt.gt(now - window))
        .order_by_asc(Column::PublishedAt)
        .all(conn)
        .await?;
    Ok(products)
}

/// Palette offered by the admin product form.
pub const PRODUCT_COLORS: [&str; 15] = [
    "Белый",
    "Черный",
    "Серый",
    "Бежевый",
    "Коричневый",
    "Красный",
    "Розовый",
    "Оранжевый",
    "Желтый",
    "Зеленый",
    "Голубой",
    "Синий",
    "Фиолетовый",
    "Многоцветный",
    "Другой",
];

pub fn list_colors() -> ApiResponse<Vec<String>> {
    let colors: Vec<String> = PRODUCT_COLORS.iter().map(|c| c.to_string()).collect();
    let total = colors.len() as i64;
    ApiResponse::success("Colors", colors, Some(Meta::new(1, total, total)))
}
