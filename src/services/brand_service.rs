use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    dto::brands::{BrandList, BrandQuery, CreateBrandRequest},
    entity::brands::{ActiveModel as BrandActive, Column as BrandCol, Entity as Brands},
    error::{AppError, AppResult},
    models::{Brand, brand_from_entity},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_brands(state: &AppState, query: BrandQuery) -> AppResult<ApiResponse<BrandList>> {
    let mut finder = Brands::find();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        finder = finder.filter(Expr::col(BrandCol::Name).ilike(format!("%{search}%")));
    }
    let items: Vec<Brand> = finder
        .order_by_asc(BrandCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(brand_from_entity)
        .collect();

    let total = items.len() as i64;
    Ok(ApiResponse::success("Brands", BrandList { items }, Some(Meta::new(1, total, total))))
}

pub async fn get_brand(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Brand>> {
    let brand = Brands::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Brand", brand_from_entity(brand), Some(Meta::empty())))
}

pub async fn create_brand(
    state: &AppState,
    payload: CreateBrandRequest,
) -> AppResult<ApiResponse<Brand>> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("Brand name is required"));
    }

    let duplicate = Brands::find()
        .filter(Expr::col(BrandCol::Name).ilike(name.clone()))
        .one(&state.orm)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(format!("Brand '{name}' already exists")));
    }

    let created = BrandActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(brand_id = %created.id, "brand created");
    Ok(ApiResponse::success("Brand created", brand_from_entity(created), Some(Meta::empty())))
}
