use crate::{
    entities::product::Model as ProductModel,
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{NewProduct, ProductChanges, ProductRepository},
    uploads::{ImageStore, UploadedImage},
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Minimum number of image files a product must be created with.
pub const MIN_IMAGES_PER_PRODUCT: usize = 2;

/// Coerced, validated fields for a new product; the image files travel
/// separately because they are persisted before the record is.
#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub name: String,
    pub variant: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub category: String,
    pub colors: Vec<String>,
    pub rating: f32,
    pub reviews: i32,
    pub is_new: bool,
    pub badge: Option<String>,
}

/// Orchestrates the product workflows that span the image store and the
/// product repository.
#[derive(Clone)]
pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
    images: Arc<dyn ImageStore>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(
        repo: Arc<dyn ProductRepository>,
        images: Arc<dyn ImageStore>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            repo,
            images,
            event_sender,
        }
    }

    /// Create a new product: persist the uploaded files first, then the
    /// record referencing them. If the record insert fails the stored files
    /// are removed again so the request leaves no orphans behind.
    #[instrument(skip(self, input, files))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
        files: Vec<UploadedImage>,
    ) -> Result<ProductModel, ServiceError> {
        if files.len() < MIN_IMAGES_PER_PRODUCT {
            return Err(ServiceError::ValidationError(format!(
                "at least {} product images are required",
                MIN_IMAGES_PER_PRODUCT
            )));
        }

        let stored = self.images.store(files).await?;

        let record = NewProduct {
            name: input.name,
            variant: input.variant,
            price: input.price,
            original_price: input.original_price,
            category: input.category,
            colors: input.colors,
            rating: input.rating,
            reviews: input.reviews,
            is_new: input.is_new,
            badge: input.badge,
            images: stored.clone(),
        };

        let product = match self.repo.insert(record).await {
            Ok(product) => product,
            Err(err) => {
                // Compensating cleanup: the files persisted above would be
                // orphaned by the failed insert.
                for filename in &stored {
                    if let Err(e) = self.images.remove(filename).await {
                        warn!("Cleanup of {} after failed insert failed: {}", filename, e);
                    }
                }
                return Err(err);
            }
        };

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;

        info!("Created product: {}", product.id);
        Ok(product)
    }

    /// All products, newest first.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductModel>, ServiceError> {
        self.repo.list_all().await
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<ProductModel, ServiceError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))
    }

    #[instrument(skip(self, changes))]
    pub async fn update_product(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<ProductModel, ServiceError> {
        let product = self
            .repo
            .update(id, changes)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(id))
            .await;

        info!("Updated product: {}", id);
        Ok(product)
    }

    /// Delete the record, then best-effort remove its image files.
    /// Individual file-removal failures are logged and swallowed; the
    /// record deletion is the user-visible operation of record.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let product = self
            .repo
            .delete(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))?;

        for filename in product.image_files() {
            if let Err(e) = self.images.remove(&filename).await {
                warn!("Failed to remove image {} for deleted product {}: {}", filename, id, e);
            }
        }

        self.event_sender
            .send_or_log(Event::ProductDeleted(id))
            .await;

        info!("Deleted product: {}", id);
        Ok(())
    }
}
