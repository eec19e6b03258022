pub mod audit;
pub mod collage;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod inventory;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod order_status;
pub mod response;
pub mod routes;
pub mod services;
pub mod shop_time;
pub mod state;
pub mod telegram;
pub mod uploads;
pub mod workers;
