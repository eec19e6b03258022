use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Announcement, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAnnouncementRequest {
    pub message: String,
    /// RFC 3339 or shop-local `YYYY-MM-DDTHH:MM`.
    pub scheduled_at: Option<String>,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnnouncementList {
    pub items: Vec<Announcement>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnpublishedProductList {
    pub items: Vec<Product>,
}
