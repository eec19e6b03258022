pub mod announcements;
pub mod audit_logs;
pub mod brands;
pub mod cart_items;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod telegram_errors;
pub mod users;

pub use announcements::Entity as Announcements;
pub use audit_logs::Entity as AuditLogs;
pub use brands::Entity as Brands;
pub use cart_items::Entity as CartItems;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use telegram_errors::Entity as TelegramErrors;
pub use users::Entity as Users;
