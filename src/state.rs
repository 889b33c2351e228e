use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::jwt::JwtKeys;
use crate::auth::pg::PgUserStore;
use crate::auth::service::UserService;
use crate::auth::store::UserStore;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub service: UserService,
    pub db: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let store = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
        let jwt = JwtKeys::new(&config.jwt);

        Ok(Self {
            service: UserService::new(store, jwt),
            db,
            config,
        })
    }

    /// Assembles state from pre-built parts; used to wire test doubles.
    pub fn from_parts(db: PgPool, config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        let jwt = JwtKeys::new(&config.jwt);
        Self {
            service: UserService::new(store, jwt),
            db,
            config,
        }
    }
}
