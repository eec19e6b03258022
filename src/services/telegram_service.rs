use std::path::{Path, PathBuf};
use std::time::Duration;

use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};

use crate::{
    dto::telegram::{
        BroadcastResult, ChannelMessageRequest, MessageRequest, SendProductsRequest,
        SendProductsResult, SendResult, TelegramStatus,
    },
    entity::{
        products::{Column as ProductCol, Entity as Products},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    mailer::{escape_html, format_rubles},
    models::{Product, json_strings, product_from_entity},
    response::{ApiResponse, Meta},
    services::telegram_error_service::{FailureContext, record_failure},
    state::AppState,
    telegram::{MEDIA_GROUP_LIMIT, TelegramError},
    uploads,
};

/// Pause between sequential photo uploads to one chat.
const PHOTO_DELAY: Duration = Duration::from_millis(300);

fn recipients_condition() -> Condition {
    Condition::all()
        .add(UserCol::IsActive.eq(true))
        .add(UserCol::TelegramUserId.is_not_null())
}

/// Telegram ids of active users that linked a chat.
pub async fn recipients<C>(conn: &C) -> AppResult<Vec<i64>>
where
    C: ConnectionTrait,
{
    let ids: Vec<Option<i64>> = Users::find()
        .select_only()
        .column(UserCol::TelegramUserId)
        .filter(recipients_condition())
        .into_tuple()
        .all(conn)
        .await?;
    Ok(ids.into_iter().flatten().collect())
}

fn require_message(message: &str) -> AppResult<()> {
    if message.trim().is_empty() {
        return Err(AppError::bad_request("Message text is required"));
    }
    Ok(())
}

fn resolve_photos(state: &AppState, photos: &[String]) -> Vec<PathBuf> {
    photos
        .iter()
        .filter_map(|p| uploads::resolve(state.upload_root(), p))
        .collect()
}

pub async fn send_to_chat(state: &AppState, chat_id: i64, text: &str) -> bool {
    match state.telegram.send_message(&chat_id.to_string(), text).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(chat_id, error = %err, kind = err.kind(), "telegram message failed");
            false
        }
    }
}

/// Text to every recipient. Returns how many chats accepted it.
pub async fn broadcast(state: &AppState, text: &str) -> AppResult<i32> {
    if text.trim().is_empty() {
        return Ok(0);
    }
    let mut sent = 0;
    for chat_id in recipients(&state.orm).await? {
        if send_to_chat(state, chat_id, text).await {
            sent += 1;
        }
    }
    tracing::info!(sent, "broadcast finished");
    Ok(sent)
}

/// Text, then each photo, to every recipient. A recipient counts once the
/// text was delivered; photo failures are only logged.
pub async fn broadcast_with_photos(state: &AppState, text: &str, photos: &[String]) -> AppResult<i32> {
    let paths = resolve_photos(state, photos);
    let mut sent = 0;
    for chat_id in recipients(&state.orm).await? {
        if !send_to_chat(state, chat_id, text).await {
            continue;
        }
        sent += 1;
        let chat = chat_id.to_string();
        for path in &paths {
            tokio::time::sleep(PHOTO_DELAY).await;
            if let Err(err) = state.telegram.send_photo(&chat, path, None).await {
                tracing::warn!(chat_id, photo = %path.display(), error = %err, "telegram photo failed");
            }
        }
    }
    tracing::info!(sent, photos = paths.len(), "broadcast with photos finished");
    Ok(sent)
}

fn channel_id(state: &AppState) -> Option<&str> {
    state
        .config
        .telegram
        .channel_id
        .as_deref()
        .filter(|c| !c.is_empty())
}

pub async fn send_to_channel(state: &AppState, text: &str) -> bool {
    let Some(channel) = channel_id(state) else {
        tracing::warn!("telegram channel is not configured");
        return false;
    };
    match state.telegram.send_message(channel, text).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "telegram channel message failed");
            let context = FailureContext {
                channel_id: Some(channel.to_string()),
                ..FailureContext::default()
            };
            record_failure(state, text, &err, context).await;
            false
        }
    }
}

async fn post_photos(state: &AppState, channel: &str, text: &str, paths: &[PathBuf]) -> Result<(), TelegramError> {
    let chunks: Vec<&[PathBuf]> = paths.chunks(MEDIA_GROUP_LIMIT).collect();
    let last = chunks.len().saturating_sub(1);
    for (index, chunk) in chunks.into_iter().enumerate() {
        let caption = (index == last).then_some(text);
        // Albums need at least two items.
        if let [single] = chunk {
            state.telegram.send_photo(channel, single, caption).await?;
        } else {
            let refs: Vec<&Path> = chunk.iter().map(PathBuf::as_path).collect();
            state.telegram.send_media_group(channel, &refs, caption).await?;
        }
    }
    Ok(())
}

/// Post photos with `text` as caption to the channel, falling back to a
/// text-only post when the photos cannot be delivered.
pub async fn send_channel_with_photos(
    state: &AppState,
    text: &str,
    photos: &[String],
    product_info: Option<String>,
) -> bool {
    let Some(channel) = channel_id(state) else {
        tracing::warn!("telegram channel is not configured");
        return false;
    };
    let paths = resolve_photos(state, photos);
    if paths.is_empty() {
        return send_to_channel(state, text).await;
    }

    match post_photos(state, channel, text, &paths).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, images = paths.len(), "channel photos failed, posting text");
            let context = FailureContext {
                product_info,
                image_count: Some(paths.len() as i32),
                channel_id: Some(channel.to_string()),
            };
            record_failure(state, text, &err, context).await;
            send_to_channel(state, text).await
        }
    }
}

pub fn product_caption(product: &Product) -> String {
    let mut lines = vec![format!("<b>{}</b>", escape_html(&product.name))];
    let fields = [
        ("Бренд", &product.brand),
        ("Размер", &product.size),
        ("Цвет", &product.color),
        ("Состояние", &product.condition),
    ];
    for (label, value) in fields {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            lines.push(format!("{label}: {}", escape_html(value)));
        }
    }
    lines.push(format!("Цена: {} ₽", format_rubles(product.price)));
    lines.join("\n")
}

pub async fn send_message(
    state: &AppState,
    chat_id: i64,
    payload: MessageRequest,
) -> AppResult<ApiResponse<SendResult>> {
    require_message(&payload.message)?;
    let success = send_to_chat(state, chat_id, &payload.message).await;
    let message = if success { "Message sent" } else { "Failed to send message" };
    Ok(ApiResponse::success(message, SendResult { success }, Some(Meta::empty())))
}

pub async fn broadcast_message(
    state: &AppState,
    payload: MessageRequest,
) -> AppResult<ApiResponse<BroadcastResult>> {
    require_message(&payload.message)?;
    let sent = broadcast(state, &payload.message).await?;
    Ok(ApiResponse::success("Broadcast sent", BroadcastResult { sent }, Some(Meta::empty())))
}

pub async fn post_to_channel(
    state: &AppState,
    payload: ChannelMessageRequest,
) -> AppResult<ApiResponse<SendResult>> {
    require_message(&payload.message)?;
    let success = if payload.images.is_empty() {
        send_to_channel(state, &payload.message).await
    } else {
        send_channel_with_photos(state, &payload.message, &payload.images, None).await
    };
    let message = if success { "Posted to channel" } else { "Failed to post to channel" };
    Ok(ApiResponse::success(message, SendResult { success }, Some(Meta::empty())))
}

pub async fn send_products(
    state: &AppState,
    payload: SendProductsRequest,
) -> AppResult<ApiResponse<SendProductsResult>> {
    if payload.product_ids.is_empty() {
        return Err(AppError::bad_request("Select at least one product"));
    }
    let models = Products::find()
        .filter(ProductCol::Id.is_in(payload.product_ids.iter().copied()))
        .all(&state.orm)
        .await?;

    let mut result = SendProductsResult::default();
    for model in models {
        let images = json_strings(&model.images);
        let info = format!("{} ({})", model.name, model.id);
        let product = product_from_entity(model, 0);
        if send_channel_with_photos(state, &product_caption(&product), &images, Some(info)).await {
            result.sent += 1;
        } else {
            result.failed += 1;
        }
    }

    tracing::info!(sent = result.sent, failed = result.failed, "products posted to channel");
    Ok(ApiResponse::success("Products sent", result, Some(Meta::empty())))
}

pub async fn status(state: &AppState) -> AppResult<ApiResponse<TelegramStatus>> {
    let recipients = Users::find()
        .filter(recipients_condition())
        .count(&state.orm)
        .await? as i64;
    Ok(ApiResponse::success(
        "Telegram status",
        TelegramStatus {
            bot_configured: state.telegram.is_configured(),
            channel_configured: channel_id(state).is_some(),
            recipients,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn product() -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Платье <летнее>".into(),
            brand: Some("Zara".into()),
            description: None,
            price: 129_900,
            size: Some("110".into()),
            color: None,
            images: vec![],
            quantity_in_stock: 1,
            available_quantity: 1,
            gender: Some("girl".into()),
            condition: Some("Отличное".into()),
            published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn caption_lists_present_fields() {
        let caption = product_caption(&product());
        assert_eq!(
            caption,
            "<b>Платье &lt;летнее&gt;</b>\nБренд: Zara\nРазмер: 110\nСостояние: Отличное\nЦена: 1299.00 ₽"
        );
    }
}
