use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::CartItem;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub session_id: String,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CartQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItem>,
    pub total_quantity: i64,
    pub total_amount: i64,
}

impl CartList {
    pub fn new(items: Vec<CartItem>) -> Self {
        let total_quantity = items.iter().map(|i| i64::from(i.quantity)).sum();
        let total_amount = items
            .iter()
            .map(|i| i.product_price * i64::from(i.quantity))
            .sum();
        Self {
            items,
            total_quantity,
            total_amount,
        }
    }
}
