use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

/// Product fields after the multipart form is parsed and files are stored.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductInput {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity_in_stock: Option<i32>,
    pub gender: Option<String>,
    pub condition: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Reset `published_at` to null on update, making the product visible now.
    #[serde(default)]
    pub clear_published_at: bool,
    /// Full image list in display order; `None` keeps the stored images.
    pub images: Option<Vec<String>>,
}

/// Shape of the `multipart/form-data` body accepted by create and update.
#[derive(ToSchema)]
pub struct ProductUploadForm {
    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity_in_stock: Option<i32>,
    pub gender: Option<String>,
    pub condition: Option<String>,
    /// RFC 3339 or shop-local `YYYY-MM-DDTHH:MM`.
    pub published_at: Option<String>,
    /// Already stored paths to keep, in order (update only).
    pub existing_images: Option<Vec<String>>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub images: Option<Vec<Vec<u8>>>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}
