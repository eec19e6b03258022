use std::env;

use chrono::{Duration, FixedOffset, Offset, Utc};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub shop_utc_offset_hours: i32,
    pub jwt: JwtConfig,
    pub reservation: ReservationConfig,
    pub workers: WorkerConfig,
    pub telegram: TelegramConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct ReservationConfig {
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub cart_cleanup_interval_secs: u64,
    pub announcement_interval_secs: u64,
    pub publication_interval_secs: u64,
    pub announcement_window_minutes: i64,
    pub publication_window_minutes: i64,
    pub publication_dedup_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub notify_to: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_or = |key: &str, default: i64| {
            get(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(default)
        };
        let parse_u64_or = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
        let host = get("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = get("APP_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let jwt = JwtConfig {
            secret: get("JWT_SECRET").ok_or_else(|| anyhow::anyhow!("JWT_SECRET is not set"))?,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "resale-shop-api".to_string()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "resale-shop-client".to_string()),
            ttl_hours: parse_or("JWT_TTL_HOURS", 24 * 7).max(1),
        };

        let reservation = ReservationConfig {
            ttl_minutes: parse_or("RESERVATION_TTL_MINUTES", 20).max(1),
        };

        let workers = WorkerConfig {
            cart_cleanup_interval_secs: parse_u64_or("CART_CLEANUP_INTERVAL_SECS", 300),
            announcement_interval_secs: parse_u64_or("ANNOUNCEMENT_INTERVAL_SECS", 60),
            publication_interval_secs: parse_u64_or("PUBLICATION_INTERVAL_SECS", 60),
            announcement_window_minutes: parse_or("ANNOUNCEMENT_WINDOW_MINUTES", 5).max(1),
            publication_window_minutes: parse_or("PUBLICATION_WINDOW_MINUTES", 5).max(1),
            publication_dedup_ttl_minutes: parse_or("PUBLICATION_DEDUP_TTL_MINUTES", 60).max(1),
        };

        let telegram = TelegramConfig {
            bot_token: get("TELEGRAM_BOT_TOKEN"),
            channel_id: get("TELEGRAM_CHANNEL_ID"),
            api_url: get("TELEGRAM_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
        };

        let username = get("SMTP_USERNAME");
        let email = EmailConfig {
            smtp_host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            smtp_port: get("SMTP_PORT")
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(587),
            from: get("SMTP_FROM").or_else(|| username.clone()),
            password: get("SMTP_PASSWORD"),
            notify_to: get("ORDER_NOTIFY_EMAIL"),
            username,
        };

        Ok(Self {
            database_url,
            host,
            port,
            upload_dir: get("UPLOAD_DIR").unwrap_or_else(|| "wwwroot".to_string()),
            shop_utc_offset_hours: parse_or("SHOP_UTC_OFFSET_HOURS", 3).clamp(-12, 14) as i32,
            jwt,
            reservation,
            workers,
            telegram,
            email,
        })
    }

    pub fn shop_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.shop_utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn reservation_ttl(&self) -> Duration {
        Duration::minutes(self.reservation.ttl_minutes)
    }
}
