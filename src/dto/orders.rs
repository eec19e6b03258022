use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{Order, OrderItem},
    order_status::OrderStatus,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub session_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub delivery_method: Option<String>,
    pub comment: Option<String>,
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// Display label ("В пути") or code ("in_transit").
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserOrdersQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, ToSchema)]
pub struct OrderStatistics {
    pub total_orders: i64,
    pub assembling_orders: i64,
    pub awaiting_payment_orders: i64,
    pub in_transit_orders: i64,
    pub delivered_orders: i64,
    pub cancelled_orders: i64,
    /// Sum over every order that is not cancelled.
    pub total_revenue: i64,
    /// Sum over orders still assembling or awaiting payment.
    pub pending_revenue: i64,
}

impl OrderStatistics {
    /// Aggregate `(status, total_amount)` pairs. Unknown labels only count toward the total.
    pub fn from_orders<'a, I>(orders: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let mut stats = OrderStatistics::default();
        for (status, amount) in orders {
            stats.total_orders += 1;
            let Ok(status) = status.parse::<OrderStatus>() else {
                continue;
            };
            match status {
                OrderStatus::Assembling => stats.assembling_orders += 1,
                OrderStatus::AwaitingPayment => stats.awaiting_payment_orders += 1,
                OrderStatus::InTransit => stats.in_transit_orders += 1,
                OrderStatus::Delivered => stats.delivered_orders += 1,
                OrderStatus::Cancelled => stats.cancelled_orders += 1,
            }
            if status != OrderStatus::Cancelled {
                stats.total_revenue += amount;
            }
            if status.is_pending() {
                stats.pending_revenue += amount;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_bucket_by_status() {
        let orders = [
            ("В сборке", 1000),
            ("Ожидает оплату", 500),
            ("В пути", 700),
            ("Доставлен", 300),
            ("Отменен", 9000),
            ("Доставлен", 200),
        ];
        let stats = OrderStatistics::from_orders(orders.iter().map(|(s, a)| (*s, *a)));

        assert_eq!(stats.total_orders, 6);
        assert_eq!(stats.assembling_orders, 1);
        assert_eq!(stats.awaiting_payment_orders, 1);
        assert_eq!(stats.in_transit_orders, 1);
        assert_eq!(stats.delivered_orders, 2);
        assert_eq!(stats.cancelled_orders, 1);
        assert_eq!(stats.total_revenue, 2700);
        assert_eq!(stats.pending_revenue, 1500);
    }

    #[test]
    fn empty_statistics_are_zero() {
        let stats = OrderStatistics::from_orders(std::iter::empty());
        assert_eq!(stats, OrderStatistics::default());
    }
}
