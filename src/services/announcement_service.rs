use chrono::{DateTime, Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit, collage,
    dto::announcements::{AnnouncementList, CreateAnnouncementRequest, UnpublishedProductList},
    entity::{
        announcements::{
            ActiveModel as AnnouncementActive, Column as AnnouncementCol, Entity as Announcements,
            Model as AnnouncementModel,
        },
        products::{Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Announcement, announcement_from_entity, json_strings},
    response::{ApiResponse, Meta},
    services::product_service,
    shop_time::{format_shop_time, parse_shop_time},
    state::AppState,
};

/// First image of each selected product, in selection order.
async fn cover_images(state: &AppState, product_ids: &[Uuid]) -> AppResult<Vec<String>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let products = Products::find()
        .filter(ProductCol::Id.is_in(product_ids.iter().copied()))
        .all(&state.orm)
        .await?;

    Ok(product_ids
        .iter()
        .filter_map(|id| products.iter().find(|p| p.id == *id))
        .filter_map(|p| json_strings(&p.images).into_iter().next())
        .collect())
}

pub async fn create_announcement(
    state: &AppState,
    user: &AuthUser,
    payload: CreateAnnouncementRequest,
) -> AppResult<ApiResponse<Announcement>> {
    let message = payload.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::bad_request("Message is required"));
    }
    let raw_time = payload
        .scheduled_at
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("Scheduled time is required"))?;

    let offset = state.config.shop_offset();
    let scheduled_at = parse_shop_time(raw_time, offset)?;
    let now = Utc::now();
    if scheduled_at <= now {
        return Err(AppError::bad_request(format!(
            "Scheduled time must be in the future. Current shop time: {}, scheduled: {}",
            format_shop_time(now, offset, "%Y-%m-%d %H:%M:%S"),
            format_shop_time(scheduled_at, offset, "%Y-%m-%d %H:%M:%S"),
        )));
    }

    let covers = cover_images(state, &payload.product_ids).await?;
    let collages = collage::create_collages(state.upload_root(), &covers)
        .await
        .map_err(|err| AppError::Internal(anyhow::anyhow!("Error creating collages: {err}")))?;

    let created = AnnouncementActive {
        id: Set(Uuid::new_v4()),
        message: Set(message),
        scheduled_at: Set(scheduled_at.into()),
        product_ids: Set(json!(payload.product_ids)),
        collage_images: Set(json!(collages)),
        is_sent: Set(false),
        sent_at: Set(None),
        sent_count: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(
        announcement_id = %created.id,
        scheduled_at = %scheduled_at,
        collages = collages.len(),
        "announcement scheduled"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "announcement_create",
        "announcements",
        json!({ "announcement_id": created.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Announcement created",
        announcement_from_entity(created),
        Some(Meta::empty()),
    ))
}

pub async fn list_announcements(state: &AppState) -> AppResult<ApiResponse<AnnouncementList>> {
    let items: Vec<Announcement> = Announcements::find()
        .order_by_desc(AnnouncementCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(announcement_from_entity)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Announcements",
        AnnouncementList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_announcement(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Announcement>> {
    let found = Announcements::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(
        "Announcement",
        announcement_from_entity(found),
        Some(Meta::empty()),
    ))
}

pub async fn delete_announcement(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Announcements::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    audit::record(
        &state.pool,
        user.user_id,
        "announcement_delete",
        "announcements",
        json!({ "announcement_id": id }),
    )
    .await;
    Ok(ApiResponse::success("Deleted", json!({}), Some(Meta::empty())))
}

pub async fn unpublished_products(state: &AppState) -> AppResult<ApiResponse<UnpublishedProductList>> {
    let items = product_service::list_unpublished(state).await?;
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Unpublished products",
        UnpublishedProductList { items },
        Some(Meta::new(1, total, total)),
    ))
}

/// Unsent announcements whose time came within the trailing `window`.
pub async fn list_due<C>(
    conn: &C,
    now: DateTime<Utc>,
    window: Duration,
) -> AppResult<Vec<AnnouncementModel>>
where
    C: ConnectionTrait,
{
    let due = Announcements::find()
        .filter(AnnouncementCol::IsSent.eq(false))
        .filter(AnnouncementCol::ScheduledAt.lte(now))
        .filter(AnnouncementCol::ScheduledAt.gt(now - window))
        .order_by_asc(AnnouncementCol::ScheduledAt)
        .all(conn)
        .await?;
    Ok(due)
}

pub async fn mark_sent<C>(
    conn: &C,
    announcement: AnnouncementModel,
    sent_count: i32,
    sent_at: DateTime<Utc>,
) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let mut active: AnnouncementActive = announcement.into();
    active.is_sent = Set(true);
    active.sent_at = Set(Some(sent_at.into()));
    active.sent_count = Set(sent_count);
    active.update(conn).await?;
    Ok(())
}
