use chrono::{FixedOffset, Utc};
use sea_orm::{EntityTrait, QueryOrder, Set};
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::telegram::{TelegramErrorGroup, TelegramErrorList},
    entity::telegram_errors::{ActiveModel as ErrorActive, Column as ErrorCol, Entity as TelegramErrors},
    error::{AppError, AppResult},
    models::{TelegramErrorEntry, telegram_error_from_entity},
    response::{ApiResponse, Meta},
    shop_time::format_shop_time,
    state::AppState,
    telegram::TelegramError,
};

/// Context stored next to a failed channel send.
#[derive(Debug, Default, Clone)]
pub struct FailureContext {
    pub product_info: Option<String>,
    pub image_count: Option<i32>,
    pub channel_id: Option<String>,
}

/// Append a failed send to the log. Never fails the caller.
pub async fn record_failure(state: &AppState, message: &str, err: &TelegramError, context: FailureContext) {
    let entry = ErrorActive {
        id: Set(Uuid::new_v4()),
        error_date: Set(Utc::now().into()),
        message: Set(message.chars().take(1000).collect()),
        details: Set(Some(err.to_string())),
        error_type: Set(err.kind().to_string()),
        product_info: Set(context.product_info),
        image_count: Set(context.image_count),
        channel_id: Set(context.channel_id),
    };
    if let Err(db_err) = TelegramErrors::insert(entry).exec(&state.orm).await {
        tracing::warn!(error = %db_err, "failed to store telegram error");
    }
}

/// Group entries (already newest first) by shop-local calendar day.
pub fn group_by_day(entries: Vec<TelegramErrorEntry>, offset: FixedOffset) -> Vec<TelegramErrorGroup> {
    let mut groups: Vec<TelegramErrorGroup> = Vec::new();
    for entry in entries {
        let date = format_shop_time(entry.error_date, offset, "%Y-%m-%d");
        match groups.last_mut() {
            Some(group) if group.date == date => group.errors.push(entry),
            _ => groups.push(TelegramErrorGroup {
                date,
                errors: vec![entry],
            }),
        }
    }
    groups
}

pub async fn list_errors(state: &AppState) -> AppResult<ApiResponse<TelegramErrorList>> {
    let entries: Vec<TelegramErrorEntry> = TelegramErrors::find()
        .order_by_desc(ErrorCol::ErrorDate)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(telegram_error_from_entity)
        .collect();

    let total = entries.len() as i64;
    let groups = group_by_day(entries, state.config.shop_offset());
    Ok(ApiResponse::success(
        "Telegram errors",
        TelegramErrorList { groups, total },
        Some(Meta::empty()),
    ))
}

pub async fn delete_error(state: &AppState, id: Uuid) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = TelegramErrors::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(ApiResponse::success("Deleted", json!({}), Some(Meta::empty())))
}

pub async fn delete_all_errors(state: &AppState) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = TelegramErrors::delete_many().exec(&state.orm).await?;
    tracing::info!(removed = result.rows_affected, "telegram error log cleared");
    Ok(ApiResponse::success(
        "Deleted",
        json!({ "removed": result.rows_affected }),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};

    fn entry(at: DateTime<Utc>) -> TelegramErrorEntry {
        TelegramErrorEntry {
            id: Uuid::new_v4(),
            error_date: at,
            message: "post".into(),
            details: None,
            error_type: "Timeout".into(),
            product_info: None,
            image_count: None,
            channel_id: None,
        }
    }

    #[test]
    fn errors_group_by_shop_day() {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        // 22:30 UTC is already the next day at +3.
        let entries = vec![
            entry(Utc.with_ymd_and_hms(2024, 5, 2, 22, 30, 0).unwrap()),
            entry(Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()),
            entry(Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()),
            entry(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()),
        ];

        let groups = group_by_day(entries, offset);
        let summary: Vec<(&str, usize)> = groups
            .iter()
            .map(|g| (g.date.as_str(), g.errors.len()))
            .collect();
        assert_eq!(summary, vec![("2024-05-03", 1), ("2024-05-02", 2), ("2024-05-01", 1)]);
    }

    #[test]
    fn no_errors_no_groups() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert!(group_by_day(Vec::new(), offset).is_empty());
    }
}
