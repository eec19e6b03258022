use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Order lifecycle. Stored in the database as the Russian display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Assembling,
    AwaitingPayment,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Assembling,
        OrderStatus::AwaitingPayment,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Assembling => "В сборке",
            OrderStatus::AwaitingPayment => "Ожидает оплату",
            OrderStatus::InTransit => "В пути",
            OrderStatus::Delivered => "Доставлен",
            OrderStatus::Cancelled => "Отменен",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            OrderStatus::Assembling => "assembling",
            OrderStatus::AwaitingPayment => "awaiting_payment",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Orders that still wait for money: counted into pending revenue.
    pub fn is_pending(&self) -> bool {
        matches!(self, OrderStatus::Assembling | OrderStatus::AwaitingPayment)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.label() == value || status.code().eq_ignore_ascii_case(value))
            .ok_or_else(|| AppError::bad_request(format!("Invalid order status: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_and_codes() {
        assert_eq!("В сборке".parse::<OrderStatus>().unwrap(), OrderStatus::Assembling);
        assert_eq!("in_transit".parse::<OrderStatus>().unwrap(), OrderStatus::InTransit);
        assert_eq!(" Delivered ".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
    }

    #[test]
    fn rejects_unknown_values() {
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn labels_round_trip_through_storage() {
        for status in OrderStatus::ALL {
            assert_eq!(status.label().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Assembling.is_terminal());
        assert!(!OrderStatus::InTransit.is_terminal());
    }
}
