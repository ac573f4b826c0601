use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::{
    config::AppConfig,
    db::create_pool,
    repository::{MemoryStore, PgStore, Store},
    services::{
        documents::{HtmlReceiptGenerator, ReceiptDocumentGenerator},
        mailer::{delivery_from_config, ReceiptDelivery},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub db_pool: Option<PgPool>,
    pub documents: Arc<dyn ReceiptDocumentGenerator>,
    pub delivery: Arc<dyn ReceiptDelivery>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = create_pool(&config)?;
        let store: Arc<dyn Store> = match &db_pool {
            Some(pool) => Arc::new(PgStore::new(pool.clone())),
            None => {
                tracing::warn!("DATABASE_URL is not set; using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        let delivery = delivery_from_config(&config, http_client);

        Ok(Self {
            config: Arc::new(config),
            store,
            db_pool,
            documents: Arc::new(HtmlReceiptGenerator),
            delivery,
        })
    }

    pub fn with_store(
        config: AppConfig,
        store: Arc<dyn Store>,
        delivery: Arc<dyn ReceiptDelivery>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            db_pool: None,
            documents: Arc::new(HtmlReceiptGenerator),
            delivery,
        }
    }
}
