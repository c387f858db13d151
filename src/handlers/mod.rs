use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::events::EventSender;
use crate::repositories::{ProductRepository, SeaOrmProductRepository};
use crate::services::ProductService;
use crate::uploads::ImageStore;

pub mod common;
pub mod health;
pub mod products;
pub mod uploads;

/// Aggregated services used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub images: Arc<dyn ImageStore>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        images: Arc<dyn ImageStore>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let repo: Arc<dyn ProductRepository> = Arc::new(SeaOrmProductRepository::new(db));
        Self::with_repository(repo, images, event_sender)
    }

    /// Assemble services over any repository implementation; used by tests
    /// to run against the in-memory repository.
    pub fn with_repository(
        repo: Arc<dyn ProductRepository>,
        images: Arc<dyn ImageStore>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let products = Arc::new(ProductService::new(repo, images.clone(), event_sender));
        Self { products, images }
    }
}
