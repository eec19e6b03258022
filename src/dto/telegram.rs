use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::TelegramErrorEntry;

#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChannelMessageRequest {
    pub message: String,
    /// Stored `/uploads/...` paths to attach.
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendProductsRequest {
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendResult {
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BroadcastResult {
    pub sent: i32,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SendProductsResult {
    pub sent: i32,
    pub failed: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TelegramStatus {
    pub bot_configured: bool,
    pub channel_configured: bool,
    pub recipients: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TelegramErrorGroup {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub errors: Vec<TelegramErrorEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TelegramErrorList {
    pub groups: Vec<TelegramErrorGroup>,
    pub total: i64,
}
