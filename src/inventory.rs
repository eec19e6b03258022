//! Soft-reservation arithmetic shared by the catalog and the cart.
//!
//! A cart row reserves stock only while it is fresh, i.e. updated after
//! `now - ttl`. Stale rows are ignored here and swept by the cleanup worker.

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, AppResult};

/// Oldest `updated_at` that still counts as a live reservation.
pub fn reservation_cutoff(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now - ttl
}

pub fn is_fresh(updated_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    updated_at > reservation_cutoff(now, ttl)
}

/// Stock minus what other sessions hold, never below zero.
pub fn available_quantity(stock: i32, reserved_by_others: i64) -> i32 {
    let available = i64::from(stock) - reserved_by_others.max(0);
    available.clamp(0, i64::from(i32::MAX)) as i32
}

/// Decide the quantity a session ends up holding after asking for `requested`
/// more units, given what it already holds (`existing`, fresh rows only).
pub fn quantity_after_add(available: i32, requested: i32, existing: Option<i32>) -> AppResult<i32> {
    if requested <= 0 {
        return Err(AppError::bad_request("Quantity must be greater than 0"));
    }
    if available <= 0 {
        return Err(AppError::bad_request("Product is out of stock"));
    }

    let to_add = requested.min(available);
    match existing {
        Some(current) => {
            let total = current.saturating_add(to_add);
            if total > available {
                return Err(AppError::bad_request(format!(
                    "Only {available} items available. You already have {current} in cart."
                )));
            }
            Ok(total)
        }
        None => Ok(to_add),
    }
}

/// Validate an absolute quantity set on an existing cart row.
pub fn check_quantity_update(available: i32, quantity: i32) -> AppResult<i32> {
    if quantity <= 0 {
        return Err(AppError::bad_request("Quantity must be greater than 0"));
    }
    if quantity > available {
        return Err(AppError::bad_request(format!(
            "Only {available} items available"
        )));
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_is_floored_at_zero() {
        assert_eq!(available_quantity(5, 0), 5);
        assert_eq!(available_quantity(5, 3), 2);
        assert_eq!(available_quantity(5, 5), 0);
        assert_eq!(available_quantity(2, 7), 0);
        assert_eq!(available_quantity(0, 0), 0);
    }

    #[test]
    fn freshness_uses_a_strict_cutoff() {
        let now = Utc::now();
        let ttl = Duration::minutes(20);
        assert!(is_fresh(now - Duration::minutes(5), now, ttl));
        assert!(!is_fresh(now - Duration::minutes(20), now, ttl));
        assert!(!is_fresh(now - Duration::minutes(45), now, ttl));
    }

    #[test]
    fn add_clamps_to_available() {
        assert_eq!(quantity_after_add(2, 5, None).unwrap(), 2);
        assert_eq!(quantity_after_add(5, 3, None).unwrap(), 3);
    }

    #[test]
    fn add_rejects_out_of_stock_and_bad_quantity() {
        let err = quantity_after_add(0, 1, None).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Product is out of stock"));

        assert!(quantity_after_add(3, 0, None).is_err());
        assert!(quantity_after_add(3, -2, None).is_err());
    }

    #[test]
    fn add_to_existing_line_never_exceeds_available() {
        assert_eq!(quantity_after_add(5, 2, Some(3)).unwrap(), 5);

        let err = quantity_after_add(5, 3, Some(3)).unwrap_err();
        match err {
            AppError::BadRequest(msg) => {
                assert_eq!(msg, "Only 5 items available. You already have 3 in cart.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn update_checks_bounds() {
        assert_eq!(check_quantity_update(4, 4).unwrap(), 4);
        assert!(check_quantity_update(4, 5).is_err());
        assert!(check_quantity_update(4, 0).is_err());
    }
}
