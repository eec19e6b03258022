mod common;

use chrono::{Duration, Utc};
use resale_shop_api::{
    dto::{
        brands::CreateBrandRequest,
        cart::AddToCartRequest,
        orders::{CreateOrderRequest, OrderLineRequest, UpdateOrderStatusRequest},
        products::ProductInput,
        users::{LinkTelegramRequest, TelegramRegisterRequest},
    },
    error::AppError,
    order_status::OrderStatus,
    services::{brand_service, cart_service, order_service, product_service, user_service},
};
use uuid::Uuid;

fn session() -> String {
    format!("sess-{}", Uuid::new_v4())
}

fn order_request(session_id: Option<String>, lines: &[(Uuid, i32)]) -> CreateOrderRequest {
    CreateOrderRequest {
        session_id,
        user_id: None,
        customer_name: "Анна".into(),
        customer_phone: "+7 900 000-00-00".into(),
        customer_email: None,
        customer_address: Some("Москва".into()),
        delivery_method: Some("pickup".into()),
        comment: None,
        items: lines
            .iter()
            .map(|(product_id, quantity)| OrderLineRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
    }
}

async fn available_for(
    state: &resale_shop_api::state::AppState,
    product_id: Uuid,
    session_id: &str,
) -> anyhow::Result<i32> {
    let resp = product_service::get_product(state, product_id, Some(session_id.to_string())).await?;
    Ok(resp.data.expect("product").available_quantity)
}

#[tokio::test]
async fn reservations_hold_stock_until_they_expire() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let product_id = common::create_product(&state, 5, 50_000, None).await?;
    let (holder, other) = (session(), session());

    cart_service::add_to_cart(
        &state,
        AddToCartRequest {
            session_id: holder.clone(),
            product_id,
            quantity: 3,
        },
    )
    .await?;

    assert_eq!(available_for(&state, product_id, &other).await?, 2);
    // A session never competes with its own reservation.
    assert_eq!(available_for(&state, product_id, &holder).await?, 5);

    let err = cart_service::add_to_cart(
        &state,
        AddToCartRequest {
            session_id: other.clone(),
            product_id,
            quantity: 3,
        },
    )
    .await
    .expect_err("only two units are free");
    assert!(matches!(err, AppError::BadRequest(_)));

    common::age_cart(&state, &holder, 21).await?;

    assert_eq!(available_for(&state, product_id, &other).await?, 5);
    let cart = cart_service::list_cart(&state, Some(&holder)).await?.data.expect("cart");
    assert!(cart.items.is_empty());

    let line = cart_service::add_to_cart(
        &state,
        AddToCartRequest {
            session_id: other.clone(),
            product_id,
            quantity: 5,
        },
    )
    .await?
    .data
    .expect("line");
    assert_eq!(line.quantity, 5);

    // The expired line restarts from scratch instead of stacking on stale quantity.
    let err = cart_service::add_to_cart(
        &state,
        AddToCartRequest {
            session_id: holder.clone(),
            product_id,
            quantity: 1,
        },
    )
    .await
    .expect_err("everything is reserved by the other session");
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn cart_quantity_updates_respect_availability() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let product_id = common::create_product(&state, 4, 10_000, None).await?;
    let sid = session();

    let line = cart_service::add_to_cart(
        &state,
        AddToCartRequest {
            session_id: sid.clone(),
            product_id,
            quantity: 1,
        },
    )
    .await?
    .data
    .expect("line");

    let updated = cart_service::update_cart_item(&state, line.id, 4).await?.data.expect("line");
    assert_eq!(updated.quantity, 4);
    assert!(cart_service::update_cart_item(&state, line.id, 5).await.is_err());

    let cart = cart_service::list_cart(&state, Some(&sid)).await?.data.expect("cart");
    assert_eq!(cart.total_quantity, 4);
    assert_eq!(cart.total_amount, 40_000);

    cart_service::remove_cart_item(&state, line.id).await?;
    let err = cart_service::remove_cart_item(&state, line.id)
        .await
        .expect_err("already removed");
    assert!(matches!(err, AppError::NotFound));

    assert!(cart_service::list_cart(&state, None).await.is_err());
    Ok(())
}

#[tokio::test]
async fn order_takes_stock_and_cancel_returns_it() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let product_id = common::create_product(&state, 5, 75_000, None).await?;
    let sid = session();

    cart_service::add_to_cart(
        &state,
        AddToCartRequest {
            session_id: sid.clone(),
            product_id,
            quantity: 2,
        },
    )
    .await?;

    let placed = order_service::create_order(&state, order_request(Some(sid.clone()), &[(product_id, 2)]))
        .await?
        .data
        .expect("order");
    assert_eq!(placed.order.status, OrderStatus::Assembling.label());
    assert_eq!(placed.order.total_amount, 150_000);
    assert!(placed.order.order_number.starts_with("ORD-"));
    assert_eq!(placed.items.len(), 1);
    assert_eq!(common::stock_of(&state, product_id).await?, 3);

    let cart = cart_service::list_cart(&state, Some(&sid)).await?.data.expect("cart");
    assert!(cart.items.is_empty(), "placing the order empties the cart");

    let cancelled = order_service::cancel_order(
        &state,
        placed.order.id,
        Some("changed my mind".into()),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(cancelled.status, OrderStatus::Cancelled.label());
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(common::stock_of(&state, product_id).await?, 5);

    let err = order_service::cancel_order(&state, placed.order.id, None)
        .await
        .expect_err("cancelled orders stay cancelled");
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(common::stock_of(&state, product_id).await?, 5);

    Ok(())
}

#[tokio::test]
async fn understocked_order_changes_nothing() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let plenty = common::create_product(&state, 3, 20_000, None).await?;
    let scarce = common::create_product(&state, 1, 30_000, None).await?;
    let sid = session();

    let err = order_service::create_order(&state, order_request(Some(sid.clone()), &[(plenty, 2), (scarce, 2)]))
        .await
        .expect_err("second line cannot be filled");
    match err {
        AppError::BadRequest(message) => assert!(message.contains("Not enough stock")),
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(common::stock_of(&state, plenty).await?, 3);
    assert_eq!(common::stock_of(&state, scarce).await?, 1);
    let (orders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE session_id = $1")
        .bind(&sid)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(orders, 0);

    Ok(())
}

#[tokio::test]
async fn status_changes_accept_codes_and_reject_unknown_values() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let admin = common::create_admin(&state).await?;
    let product_id = common::create_product(&state, 2, 10_000, None).await?;
    let order = order_service::create_order(&state, order_request(None, &[(product_id, 1)]))
        .await?
        .data
        .expect("order")
        .order;

    for (input, label) in [
        ("awaiting_payment", "Ожидает оплату"),
        ("В пути", "В пути"),
        ("delivered", "Доставлен"),
    ] {
        let updated = order_service::update_order_status(
            &state,
            &admin,
            order.id,
            UpdateOrderStatusRequest {
                status: input.into(),
            },
        )
        .await?
        .data
        .expect("order");
        assert_eq!(updated.status, label);
    }

    let err = order_service::cancel_order(&state, order.id, Some("too late".into()))
        .await
        .expect_err("delivered orders cannot be cancelled");
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(common::stock_of(&state, product_id).await?, 1);

    let err = order_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "lost".into(),
        },
    )
    .await
    .expect_err("unknown status");
    assert!(matches!(err, AppError::BadRequest(_)));

    let current = order_service::get_order(&state, order.id).await?.data.expect("order");
    assert_eq!(current.order.status, "Доставлен");
    // Status overrides never touch stock.
    assert_eq!(common::stock_of(&state, product_id).await?, 1);

    Ok(())
}

#[tokio::test]
async fn scheduled_products_stay_hidden_until_published() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let admin = common::create_admin(&state).await?;

    let created = product_service::create_product(
        &state,
        &admin,
        ProductInput {
            name: Some("Куртка демисезонная".into()),
            price: Some(150_000),
            quantity_in_stock: Some(0),
            published_at: Some(Utc::now() + Duration::days(1)),
            ..ProductInput::default()
        },
    )
    .await?
    .data
    .expect("product");
    assert_eq!(created.quantity_in_stock, 1, "non-positive stock defaults to one");

    let err = product_service::get_product(&state, created.id, None)
        .await
        .expect_err("hidden until its publish time");
    assert!(matches!(err, AppError::NotFound));
    let scheduled = product_service::list_unpublished(&state).await?;
    assert!(scheduled.iter().any(|p| p.id == created.id));

    product_service::publish_product(&state, &admin, created.id).await?;

    let visible = product_service::get_product(&state, created.id, None).await?.data.expect("product");
    assert_eq!(visible.available_quantity, 1);
    let scheduled = product_service::list_unpublished(&state).await?;
    assert!(scheduled.iter().all(|p| p.id != created.id));

    Ok(())
}

#[tokio::test]
async fn telegram_registration_and_linking() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let admin = common::create_admin(&state).await?;
    let telegram_id = common::random_telegram_id();

    let subscriber = user_service::register_telegram(
        &state,
        TelegramRegisterRequest {
            telegram_user_id: telegram_id,
            full_name: Some("Мария".into()),
        },
    )
    .await?
    .data
    .expect("user");
    assert_eq!(subscriber.username, format!("tg_{telegram_id}"));
    assert!(!subscriber.is_admin);

    let again = user_service::register_telegram(
        &state,
        TelegramRegisterRequest {
            telegram_user_id: telegram_id,
            full_name: None,
        },
    )
    .await?
    .data
    .expect("user");
    assert_eq!(again.id, subscriber.id);

    let check = user_service::is_telegram_admin(&state, telegram_id).await?.data.expect("check");
    assert!(!check.is_admin);

    let err = user_service::link_telegram(
        &state,
        &admin,
        admin.user_id,
        LinkTelegramRequest {
            telegram_user_id: Some(telegram_id),
        },
    )
    .await
    .expect_err("id already belongs to the subscriber");
    assert!(matches!(err, AppError::Conflict(_)));

    let admin_telegram = common::random_telegram_id();
    user_service::link_telegram(
        &state,
        &admin,
        admin.user_id,
        LinkTelegramRequest {
            telegram_user_id: Some(admin_telegram),
        },
    )
    .await?;
    let check = user_service::is_telegram_admin(&state, admin_telegram).await?.data.expect("check");
    assert!(check.is_admin);

    Ok(())
}

#[tokio::test]
async fn brand_names_are_unique_ignoring_case() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let name = format!("Brand {}", Uuid::new_v4().simple());

    brand_service::create_brand(&state, CreateBrandRequest { name: name.clone() }).await?;
    let err = brand_service::create_brand(
        &state,
        CreateBrandRequest {
            name: name.to_uppercase(),
        },
    )
    .await
    .expect_err("duplicate brand");
    assert!(matches!(err, AppError::Conflict(_)));

    let blank = brand_service::create_brand(&state, CreateBrandRequest { name: "  ".into() }).await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));

    let found = brand_service::list_brands(
        &state,
        resale_shop_api::dto::brands::BrandQuery {
            search: Some(name.to_lowercase()),
        },
    )
    .await?
    .data
    .expect("brands");
    assert_eq!(found.items.len(), 1);

    Ok(())
}
