use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{announcements, brands, order_items, orders, products, telegram_errors, users};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub telegram_user_id: Option<i64>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub images: Vec<String>,
    pub quantity_in_stock: i32,
    /// Stock minus fresh reservations held by other sessions.
    pub available_quantity: i32,
    pub gender: Option<String>,
    pub condition: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub session_id: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_price: i64,
    pub product_brand: Option<String>,
    pub product_size: Option<String>,
    pub product_color: Option<String>,
    pub product_images: Vec<String>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub delivery_method: Option<String>,
    pub comment: Option<String>,
    pub status: String,
    pub total_amount: i64,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_price: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Announcement {
    pub id: Uuid,
    pub message: String,
    pub scheduled_at: DateTime<Utc>,
    pub product_ids: Vec<Uuid>,
    pub collage_images: Vec<String>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub sent_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TelegramErrorEntry {
    pub id: Uuid,
    pub error_date: DateTime<Utc>,
    pub message: String,
    pub details: Option<String>,
    pub error_type: String,
    pub product_info: Option<String>,
    pub image_count: Option<i32>,
    pub channel_id: Option<String>,
}

/// Read a JSONB array of strings, skipping anything that is not a string.
pub fn json_strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn json_uuids(value: &Value) -> Vec<Uuid> {
    json_strings(value)
        .iter()
        .filter_map(|s| Uuid::parse_str(s).ok())
        .collect()
}

pub fn user_from_entity(model: users::Model) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        full_name: model.full_name,
        is_active: model.is_active,
        is_admin: model.is_admin,
        telegram_user_id: model.telegram_user_id,
        last_login_at: model.last_login_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn product_from_entity(model: products::Model, available_quantity: i32) -> Product {
    Product {
        id: model.id,
        images: json_strings(&model.images),
        name: model.name,
        brand: model.brand,
        description: model.description,
        price: model.price,
        size: model.size,
        color: model.color,
        quantity_in_stock: model.quantity_in_stock,
        available_quantity,
        gender: model.gender,
        condition: model.condition,
        published_at: model.published_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_from_entity(model: orders::Model) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        order_number: model.order_number,
        customer_name: model.customer_name,
        customer_phone: model.customer_phone,
        customer_email: model.customer_email,
        customer_address: model.customer_address,
        delivery_method: model.delivery_method,
        comment: model.comment,
        status: model.status,
        total_amount: model.total_amount,
        cancelled_at: model.cancelled_at.map(|dt| dt.with_timezone(&Utc)),
        cancellation_reason: model.cancellation_reason,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: order_items::Model) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        product_price: model.product_price,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn announcement_from_entity(model: announcements::Model) -> Announcement {
    Announcement {
        id: model.id,
        product_ids: json_uuids(&model.product_ids),
        collage_images: json_strings(&model.collage_images),
        message: model.message,
        scheduled_at: model.scheduled_at.with_timezone(&Utc),
        is_sent: model.is_sent,
        sent_at: model.sent_at.map(|dt| dt.with_timezone(&Utc)),
        sent_count: model.sent_count,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn brand_from_entity(model: brands::Model) -> Brand {
    Brand {
        id: model.id,
        name: model.name,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn telegram_error_from_entity(model: telegram_errors::Model) -> TelegramErrorEntry {
    TelegramErrorEntry {
        id: model.id,
        error_date: model.error_date.with_timezone(&Utc),
        message: model.message,
        details: model.details,
        error_type: model.error_type,
        product_info: model.product_info,
        image_count: model.image_count,
        channel_id: model.channel_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_helpers_skip_foreign_values() {
        let id = Uuid::new_v4();
        assert_eq!(
            json_strings(&json!(["/uploads/a.jpg", 3, null, "/uploads/b.jpg"])),
            vec!["/uploads/a.jpg".to_string(), "/uploads/b.jpg".to_string()]
        );
        assert!(json_strings(&json!({"not": "an array"})).is_empty());
        assert_eq!(json_uuids(&json!([id.to_string(), "nope"])), vec![id]);
    }
}
