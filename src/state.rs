use std::{path::Path, sync::Arc};

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    mailer::Mailer,
    telegram::TelegramClient,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub telegram: TelegramClient,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let orm = orm_from_pool(&pool);
        let telegram = TelegramClient::new(&config.telegram);
        let mailer = Mailer::new(config.email.clone());
        Self {
            pool,
            orm,
            config: Arc::new(config),
            telegram,
            mailer,
        }
    }

    pub fn upload_root(&self) -> &Path {
        Path::new(&self.config.upload_dir)
    }
}
