pub mod announcements;
pub mod auth;
pub mod brands;
pub mod cart;
pub mod orders;
pub mod products;
pub mod telegram;
pub mod users;
