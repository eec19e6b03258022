mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use resale_shop_api::{
    dto::orders::{CreateOrderRequest, OrderLineRequest},
    entity::users::Model as UserModel,
    middleware::auth::issue_token,
    routes::create_api_router,
    services::order_service,
    state::AppState,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "shop-test-boundary";

fn app(state: &AppState) -> Router {
    Router::new()
        .nest("/api", create_api_router())
        .with_state(state.clone())
}

async fn send(state: &AppState, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let response = app(state).oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

async fn place_order(state: &AppState, product_id: Uuid, quantity: i32) -> anyhow::Result<Uuid> {
    let placed = order_service::create_order(
        state,
        CreateOrderRequest {
            session_id: None,
            user_id: None,
            customer_name: "Ольга".into(),
            customer_phone: "+7 900 111-22-33".into(),
            customer_email: None,
            customer_address: None,
            delivery_method: None,
            comment: None,
            items: vec![OrderLineRequest { product_id, quantity }],
        },
    )
    .await?;
    Ok(placed.data.expect("order").order.id)
}

fn bearer(state: &AppState, user: &UserModel) -> anyhow::Result<String> {
    let (token, _) = issue_token(&state.config.jwt, user)?;
    Ok(format!("Bearer {token}"))
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{file_name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn product_form(
    method: &str,
    uri: &str,
    auth: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> anyhow::Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields, file)))?)
}

fn stored_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir.join("uploads"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn cancel_accepts_a_missing_body() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let product_id = common::create_product(&state, 3, 40_000, None).await?;
    let order_id = place_order(&state, product_id, 2).await?;
    assert_eq!(common::stock_of(&state, product_id).await?, 1);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/orders/{order_id}/cancel"))
        .body(Body::empty())?;
    let (status, body) = send(&state, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Отменен");
    assert_eq!(common::stock_of(&state, product_id).await?, 3);

    let again = Request::builder()
        .method("POST")
        .uri(format!("/api/orders/{order_id}/cancel"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "reason": "twice" }).to_string()))?;
    let (status, body) = send(&state, again).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
    assert_eq!(common::stock_of(&state, product_id).await?, 3);

    Ok(())
}

#[tokio::test]
async fn bot_reads_and_moves_orders_without_a_token() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let product_id = common::create_product(&state, 2, 15_000, None).await?;
    let order_id = place_order(&state, product_id, 1).await?;

    let request = Request::builder()
        .uri(format!("/api/orders/{order_id}/public"))
        .body(Body::empty())?;
    let (status, body) = send(&state, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["id"], order_id.to_string());
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));

    // The authenticated variant still needs a token.
    let request = Request::builder()
        .uri(format!("/api/orders/{order_id}"))
        .body(Body::empty())?;
    let (status, _) = send(&state, request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/api/orders/{order_id}/status/public"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "status": "in_transit" }).to_string()))?;
    let (status, body) = send(&state, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "В пути");

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/api/orders/{order_id}/status/public"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "status": "teleported" }).to_string()))?;
    let (status, _) = send(&state, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri(format!("/api/orders/{}/public", Uuid::new_v4()))
        .body(Body::empty())?;
    let (status, _) = send(&state, request).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn rejected_product_forms_leave_no_files_behind() -> anyhow::Result<()> {
    let upload_dir = tempfile::tempdir()?;
    let upload_path = upload_dir.path().to_string_lossy().into_owned();
    let Some(state) = common::test_state(&[("UPLOAD_DIR", upload_path.as_str())]).await? else {
        return Ok(());
    };
    let staff = common::create_user(&state, false).await?;
    let admin = common::create_user(&state, true).await?;
    let staff_auth = bearer(&state, &staff)?;
    let admin_auth = bearer(&state, &admin)?;
    let photo: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

    let request = product_form(
        "POST",
        "/api/products",
        &staff_auth,
        &[("name", "Платье"), ("price", "120000")],
        Some(("dress.jpg", photo)),
    )?;
    let (status, _) = send(&state, request).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(stored_files(upload_dir.path()), 0);

    let request = product_form(
        "POST",
        "/api/products",
        &admin_auth,
        &[("price", "120000")],
        Some(("dress.jpg", photo)),
    )?;
    let (status, _) = send(&state, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stored_files(upload_dir.path()), 0);

    let request = product_form(
        "POST",
        "/api/products",
        &admin_auth,
        &[("name", "Платье"), ("price", "много")],
        Some(("dress.jpg", photo)),
    )?;
    let (status, _) = send(&state, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stored_files(upload_dir.path()), 0);

    let request = product_form(
        "PUT",
        &format!("/api/products/{}", Uuid::new_v4()),
        &admin_auth,
        &[("name", "Платье")],
        Some(("dress.jpg", photo)),
    )?;
    let (status, _) = send(&state, request).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(stored_files(upload_dir.path()), 0);

    let request = product_form(
        "POST",
        "/api/products",
        &admin_auth,
        &[("name", "Платье"), ("price", "120000")],
        Some(("dress.jpg", photo)),
    )?;
    let (status, body) = send(&state, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["images"].as_array().map(Vec::len), Some(1));
    assert_eq!(stored_files(upload_dir.path()), 1);

    Ok(())
}

#[tokio::test]
async fn empty_published_at_makes_a_product_visible() -> anyhow::Result<()> {
    let Some(state) = common::test_state(&[]).await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, true).await?;
    let auth = bearer(&state, &admin)?;
    let tomorrow = chrono::Utc::now() + chrono::Duration::days(1);
    let product_id = common::create_product(&state, 1, 50_000, Some(tomorrow)).await?;

    let request = Request::builder()
        .uri(format!("/api/products/{product_id}"))
        .body(Body::empty())?;
    let (status, _) = send(&state, request).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = product_form(
        "PUT",
        &format!("/api/products/{product_id}"),
        &auth,
        &[("published_at", "")],
        None,
    )?;
    let (status, body) = send(&state, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["published_at"].is_null());

    let request = Request::builder()
        .uri(format!("/api/products/{product_id}"))
        .body(Body::empty())?;
    let (status, _) = send(&state, request).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
