use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CreateOrderRequest, OrderList, OrderStatistics, OrderWithItems, UpdateOrderStatusRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, order_from_entity, order_item_from_entity},
    order_status::OrderStatus,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// `ORD-<yyyymmdd>-<8 uppercase hex>`; uniqueness is enforced by an index.
pub fn build_order_number(now: DateTime<Utc>, seed: Uuid) -> String {
    let suffix: String = seed.simple().to_string().chars().take(8).collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix.to_uppercase())
}

/// Sum quantities of repeated product lines, keeping first-seen order.
pub fn merge_lines(lines: &[(Uuid, i32)]) -> AppResult<Vec<(Uuid, i32)>> {
    let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(lines.len());
    for &(product_id, quantity) in lines {
        if quantity <= 0 {
            return Err(AppError::bad_request("Quantity must be greater than 0"));
        }
        match merged.iter_mut().find(|(id, _)| *id == product_id) {
            Some((_, total)) => *total = total.saturating_add(quantity),
            None => merged.push((product_id, quantity)),
        }
    }
    Ok(merged)
}

/// Add `price * quantity` to a running total, refusing amounts that overflow.
pub fn add_line_amount(total: i64, price: i64, quantity: i32) -> AppResult<i64> {
    price
        .checked_mul(i64::from(quantity))
        .and_then(|line| total.checked_add(line))
        .ok_or_else(|| AppError::bad_request("Order total is too large"))
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn create_order(
    state: &AppState,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let customer_name = required(&payload.customer_name, "Customer name")?;
    let customer_phone = required(&payload.customer_phone, "Customer phone")?;
    if payload.items.is_empty() {
        return Err(AppError::bad_request("Order must contain at least one item"));
    }
    let lines: Vec<(Uuid, i32)> = payload
        .items
        .iter()
        .map(|line| (line.product_id, line.quantity))
        .collect();
    let lines = merge_lines(&lines)?;

    let now = Utc::now();
    let order_id = Uuid::new_v4();
    let session_id = optional(payload.session_id);

    let txn = state.orm.begin().await?;

    // Each decrement only applies while enough stock remains; any miss drops the transaction.
    let mut snapshots = Vec::with_capacity(lines.len());
    let mut total_amount: i64 = 0;
    for (product_id, quantity) in &lines {
        let product = Products::find_by_id(*product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::bad_request(format!("Product {product_id} not found")))?;

        let updated = Products::update_many()
            .col_expr(
                ProdCol::QuantityInStock,
                Expr::col(ProdCol::QuantityInStock).sub(*quantity),
            )
            .col_expr(ProdCol::UpdatedAt, Expr::value(now))
            .filter(ProdCol::Id.eq(*product_id))
            .filter(ProdCol::QuantityInStock.gte(*quantity))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::bad_request(format!(
                "Not enough stock for product {}. Available: {}, Requested: {}",
                product.name, product.quantity_in_stock, quantity
            )));
        }

        total_amount = add_line_amount(total_amount, product.price, *quantity)?;
        snapshots.push((product, *quantity));
    }

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(payload.user_id),
        session_id: Set(session_id.clone()),
        order_number: Set(build_order_number(now, Uuid::new_v4())),
        customer_name: Set(customer_name),
        customer_phone: Set(customer_phone),
        customer_email: Set(optional(payload.customer_email)),
        customer_address: Set(optional(payload.customer_address)),
        delivery_method: Set(optional(payload.delivery_method)),
        comment: Set(optional(payload.comment)),
        status: Set(OrderStatus::Assembling.label().to_string()),
        total_amount: Set(total_amount),
        cancelled_at: Set(None),
        cancellation_reason: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(snapshots.len());
    for (product, quantity) in snapshots {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            product_name: Set(product.name),
            product_price: Set(product.price),
            quantity: Set(quantity),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    if let Some(session_id) = session_id.as_deref() {
        CartItems::delete_many()
            .filter(CartCol::SessionId.eq(session_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    let order = order_from_entity(order);
    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = order.total_amount,
        "order created"
    );
    notify_by_email(state, &order, &items);

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

fn notify_by_email(state: &AppState, order: &Order, items: &[OrderItem]) {
    if !state.mailer.is_enabled() {
        tracing::warn!(order_number = %order.order_number, "smtp not configured, order email skipped");
        return;
    }
    let mailer = state.mailer.clone();
    let offset = state.config.shop_offset();
    let order = order.clone();
    let items = items.to_vec();
    tokio::spawn(async move {
        match mailer.send_order_confirmation(&order, &items, offset).await {
            Ok(()) => tracing::info!(order_number = %order.order_number, "order email sent"),
            Err(err) => {
                tracing::error!(error = %err, order_number = %order.order_number, "order email failed")
            }
        }
    });
}

/// Cancel a live order and return its quantities to stock.
pub async fn cancel_order(
    state: &AppState,
    id: Uuid,
    reason: Option<String>,
) -> AppResult<ApiResponse<Order>> {
    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Ok(status) = order.status.parse::<OrderStatus>() {
        if status.is_terminal() {
            return Err(AppError::bad_request(format!(
                "Order cannot be cancelled in status {}",
                status.label()
            )));
        }
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    for item in &items {
        let restored = Products::update_many()
            .col_expr(
                ProdCol::QuantityInStock,
                Expr::col(ProdCol::QuantityInStock).add(item.quantity),
            )
            .col_expr(ProdCol::UpdatedAt, Expr::value(now))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(&txn)
            .await?;
        if restored.rows_affected == 0 {
            tracing::warn!(product_id = %item.product_id, "product gone, stock not restored");
        }
    }

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.label().to_string());
    active.cancelled_at = Set(Some(now.into()));
    active.cancellation_reason = Set(optional(reason));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    txn.commit().await?;
    tracing::info!(order_id = %order.id, "order cancelled");

    // Customers cancel without a token.
    audit::record(
        &state.pool,
        None::<Uuid>,
        "order_cancel",
        "orders",
        json!({ "order_id": order.id, "restored_lines": items.len() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Set any valid status. Stock is only restored through `cancel_order`.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    set_status(state, Some(user.user_id), id, payload).await
}

/// Status change requested by the bot, which has no user account.
pub async fn update_order_status_public(
    state: &AppState,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    set_status(state, None, id, payload).await
}

async fn set_status(
    state: &AppState,
    actor: Option<Uuid>,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let status: OrderStatus = payload.status.parse()?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let stamp_cancel = status == OrderStatus::Cancelled && existing.cancelled_at.is_none();
    let mut active: OrderActive = existing.into();
    active.status = Set(status.label().to_string());
    if stamp_cancel {
        active.cancelled_at = Set(Some(now.into()));
    }
    active.updated_at = Set(now.into());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        actor,
        "order_status_update",
        "orders",
        json!({ "order_id": order.id, "status": order.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.trim().is_empty()) {
        let status: OrderStatus = status.parse()?;
        condition = condition.add(OrderCol::Status.eq(status.label()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn list_user_orders(
    state: &AppState,
    user_id: Uuid,
) -> AppResult<ApiResponse<OrderList>> {
    let orders: Vec<Order> = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let total = orders.len() as i64;
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(order_from_entity)
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order found",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

pub async fn order_statistics(state: &AppState) -> AppResult<ApiResponse<OrderStatistics>> {
    let rows: Vec<(String, i64)> = Orders::find()
        .select_only()
        .column(OrderCol::Status)
        .column(OrderCol::TotalAmount)
        .into_tuple()
        .all(&state.orm)
        .await?;

    let stats = OrderStatistics::from_orders(rows.iter().map(|(s, a)| (s.as_str(), *a)));
    Ok(ApiResponse::success("Statistics", stats, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn order_number_has_date_and_upper_hex() {
        let now = Utc.with_ymd_and_hms(2026, 2, 14, 23, 59, 0).unwrap();
        let seed = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        assert_eq!(build_order_number(now, seed), "ORD-20260214-A1B2C3D4");
    }

    #[test]
    fn order_numbers_differ_per_seed() {
        let now = Utc::now();
        let a = build_order_number(now, Uuid::new_v4());
        let b = build_order_number(now, Uuid::new_v4());
        assert_ne!(a, b);
        assert_eq!(a.len(), "ORD-20260101-XXXXXXXX".len());
    }

    #[test]
    fn duplicate_lines_are_merged() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_lines(&[(a, 1), (b, 2), (a, 3)]).unwrap();
        assert_eq!(merged, vec![(a, 4), (b, 2)]);
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        assert!(merge_lines(&[(Uuid::new_v4(), 0)]).is_err());
    }

    #[test]
    fn line_amounts_accumulate_without_overflow() {
        assert_eq!(add_line_amount(1_000, 2_500, 3).unwrap(), 8_500);
        assert!(matches!(
            add_line_amount(0, i64::MAX / 2, 3),
            Err(AppError::BadRequest(_))
        ));
        assert!(add_line_amount(i64::MAX - 1, 1, 2).is_err());
    }
}
