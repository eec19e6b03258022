use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::Field},
    routing::{get, post},
};
use axum::body::Bytes;
use uuid::Uuid;

use crate::{
    dto::products::{ProductInput, ProductList, ProductUploadForm},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::ApiResponse,
    routes::params::{Pagination, ProductQuery, SessionQuery},
    services::product_service,
    shop_time::parse_shop_time,
    state::AppState,
    uploads,
};

/// Multipart bodies carry photos; everything else stays on the default limit.
pub const UPLOAD_BODY_LIMIT: usize = 25 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    let uploads = Router::new()
        .route("/", post(create_product))
        .route("/{id}", axum::routing::put(update_product))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/", get(list_products))
        .route("/admin/all", get(list_all_products))
        .route("/{id}", get(get_product).delete(delete_product))
        .route("/{id}/publish", post(publish_product))
        .merge(uploads)
}

fn form_error(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::bad_request(err.body_text())
}

async fn text(field: Field<'_>) -> AppResult<String> {
    field.text().await.map_err(form_error)
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Parsed product form. Uploaded files stay in memory until the whole form
/// has parsed.
struct ProductForm {
    input: ProductInput,
    kept: Option<Vec<String>>,
    files: Vec<(String, Bytes)>,
}

impl ProductForm {
    /// Write the buffered files and assemble the final image list. Images are
    /// `None` when the form neither keeps nor uploads any, so updates leave
    /// the stored list alone.
    async fn store(self, state: &AppState) -> AppResult<(ProductInput, Vec<String>)> {
        let mut uploaded: Vec<String> = Vec::with_capacity(self.files.len());
        for (file_name, bytes) in &self.files {
            match uploads::save_image(state.upload_root(), file_name, bytes).await {
                Ok(path) => uploaded.push(path),
                Err(err) => {
                    uploads::discard(state.upload_root(), &uploaded).await;
                    return Err(err);
                }
            }
        }

        let mut input = self.input;
        input.images = match self.kept {
            Some(mut images) => {
                images.extend(uploaded.iter().cloned());
                Some(images)
            }
            None if !uploaded.is_empty() => Some(uploaded.clone()),
            None => None,
        };
        Ok((input, uploaded))
    }
}

async fn read_product_form(state: &AppState, mut multipart: Multipart) -> AppResult<ProductForm> {
    let offset = state.config.shop_offset();
    let mut form = ProductForm {
        input: ProductInput::default(),
        kept: None,
        files: Vec::new(),
    };
    let input = &mut form.input;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(form_error)?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                if uploads::image_extension(&file_name).is_none() {
                    return Err(AppError::bad_request(format!("Unsupported image type: {file_name}")));
                }
                if bytes.is_empty() {
                    return Err(AppError::bad_request(format!("Empty file: {file_name}")));
                }
                form.files.push((file_name, bytes));
            }
            "existing_images" => {
                let value = text(field).await?;
                let list = form.kept.get_or_insert_with(Vec::new);
                list.extend(non_empty(value));
            }
            "name" => input.name = Some(text(field).await?),
            "brand" => input.brand = Some(text(field).await?),
            "description" => input.description = Some(text(field).await?),
            "size" => input.size = Some(text(field).await?),
            "color" => input.color = Some(text(field).await?),
            "gender" => input.gender = Some(text(field).await?),
            "condition" => input.condition = Some(text(field).await?),
            "price" => {
                if let Some(raw) = non_empty(text(field).await?) {
                    let price = raw
                        .parse::<i64>()
                        .map_err(|_| AppError::bad_request(format!("Invalid price: {raw}")))?;
                    input.price = Some(price);
                }
            }
            "quantity_in_stock" => {
                if let Some(raw) = non_empty(text(field).await?) {
                    let stock = raw
                        .parse::<i32>()
                        .map_err(|_| AppError::bad_request(format!("Invalid quantity: {raw}")))?;
                    input.quantity_in_stock = Some(stock);
                }
            }
            // An explicitly empty value makes the product visible right away.
            "published_at" => match non_empty(text(field).await?) {
                Some(raw) => {
                    input.published_at = Some(parse_shop_time(&raw, offset)?);
                    input.clear_published_at = false;
                }
                None => {
                    input.published_at = None;
                    input.clear_published_at = true;
                }
            },
            other => tracing::debug!(field = other, "ignoring unknown product form field"),
        }
    }

    Ok(form)
}

/// Store the form's files, run `save`, and remove the files again when it fails.
async fn save_with_uploads<F, Fut>(state: &AppState, form: ProductForm, save: F) -> AppResult<ApiResponse<Product>>
where
    F: FnOnce(ProductInput) -> Fut,
    Fut: Future<Output = AppResult<ApiResponse<Product>>>,
{
    let (input, uploaded) = form.store(state).await?;
    let result = save(input).await;
    if result.is_err() && !uploaded.is_empty() {
        tracing::debug!(files = uploaded.len(), "product not saved, removing uploaded images");
        uploads::discard(state.upload_root(), &uploaded).await;
    }
    result
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("session_id" = Option<String>, Query, description = "Caller's cart session"),
        ("q" = Option<String>, Query, description = "Search in name, description and brand"),
        ("brand" = Option<String>, Query, description = "Brand name"),
        ("gender" = Option<String>, Query, description = "Gender"),
        ("size" = Option<String>, Query, description = "Size"),
        ("min_price" = Option<i64>, Query, description = "Lowest price in kopecks"),
        ("max_price" = Option<i64>, Query, description = "Highest price in kopecks"),
        ("sort_by" = Option<String>, Query, description = "created_at | price | name"),
        ("sort_order" = Option<String>, Query, description = "asc | desc"),
    ),
    responses(
        (status = 200, description = "Visible products with availability", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("session_id" = Option<String>, Query, description = "Caller's cart session")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found or not yet published"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SessionQuery>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id, query.session_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body(content = ProductUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Create product", body = ApiResponse<Product>),
        (status = 400, description = "Invalid product data")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    ensure_admin(&user)?;
    let form = read_product_form(&state, multipart).await?;
    let resp = save_with_uploads(&state, form, |input| {
        product_service::create_product(&state, &user, input)
    })
    .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body(content = ProductUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Update product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    ensure_admin(&user)?;
    let form = read_product_form(&state, multipart).await?;
    let resp = save_with_uploads(&state, form, |input| {
        product_service::update_product(&state, &user, id, input)
    })
    .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Delete product", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/publish",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product visible from now on", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn publish_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::publish_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/admin/all",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "All products including scheduled ones", body = ApiResponse<ProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_all_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_all_products(&state, &user, pagination).await?;
    Ok(Json(resp))
}
