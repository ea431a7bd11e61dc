use sqlx::AnyPool;

use crate::config::Config;
use crate::redmine::RedmineClient;

#[derive(Clone)]
pub struct AppState {
    pub db: AnyPool,
    pub redmine: RedmineClient,
}

impl AppState {
    pub fn new(config: &Config, db: AnyPool) -> anyhow::Result<Self> {
        let redmine = RedmineClient::new(&config.redmine, db.clone())?;
        Ok(Self { db, redmine })
    }
}
