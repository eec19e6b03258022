pub mod announcement_service;
pub mod auth_service;
pub mod brand_service;
pub mod cart_service;
pub mod order_service;
pub mod product_service;
pub mod telegram_error_service;
pub mod telegram_service;
pub mod user_service;
