use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryOrder, Set,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::entities::product::{self, Column, Entity as Product, Model as ProductModel};
use crate::errors::ServiceError;

/// Fields required to persist a new product. Identifier and creation
/// timestamp are assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewProduct {
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
    pub images: Vec<String>,
}

/// Partial update: only the fields that are `Some` are applied.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub variant: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Option<Decimal>>,
    pub category: Option<String>,
    pub colors: Option<Vec<String>>,
    pub rating: Option<f32>,
    pub reviews: Option<i32>,
    pub is_new: Option<bool>,
    pub badge: Option<Option<String>>,
    pub images: Option<Vec<String>>,
}

/// Durable storage for product records, swappable so the service can be
/// exercised against a fake in tests.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Assigns id and creation timestamp, persists, returns the stored row.
    async fn insert(&self, product: NewProduct) -> Result<ProductModel, ServiceError>;

    /// All records, newest first.
    async fn list_all(&self) -> Result<Vec<ProductModel>, ServiceError>;

    async fn get(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError>;

    /// Applies the provided fields; `None` means the record was absent.
    async fn update(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<Option<ProductModel>, ServiceError>;

    /// Removes the record, returning its prior state so the caller can
    /// clean up referenced image files.
    async fn delete(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError>;
}

/// sea-orm backed repository used in production.
#[derive(Debug, Clone)]
pub struct SeaOrmProductRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmProductRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for SeaOrmProductRepository {
    async fn insert(&self, p: NewProduct) -> Result<ProductModel, ServiceError> {
        let record = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(p.name),
            variant: Set(p.variant),
            price: Set(p.price),
            original_price: Set(p.original_price),
            category: Set(p.category),
            colors: Set(json!(p.colors)),
            rating: Set(p.rating),
            reviews: Set(p.reviews),
            is_new: Set(p.is_new),
            badge: Set(p.badge),
            images: Set(json!(p.images)),
            created_at: Set(Utc::now()),
        };

        record.insert(&*self.db).await.map_err(Into::into)
    }

    async fn list_all(&self) -> Result<Vec<ProductModel>, ServiceError> {
        Product::find()
            .order_by_desc(Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError> {
        Product::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<Option<ProductModel>, ServiceError> {
        let Some(existing) = Product::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(variant) = changes.variant {
            active.variant = Set(variant);
        }
        if let Some(price) = changes.price {
            active.price = Set(price);
        }
        if let Some(original_price) = changes.original_price {
            active.original_price = Set(original_price);
        }
        if let Some(category) = changes.category {
            active.category = Set(category);
        }
        if let Some(colors) = changes.colors {
            active.colors = Set(json!(colors));
        }
        if let Some(rating) = changes.rating {
            active.rating = Set(rating);
        }
        if let Some(reviews) = changes.reviews {
            active.reviews = Set(reviews);
        }
        if let Some(is_new) = changes.is_new {
            active.is_new = Set(is_new);
        }
        if let Some(badge) = changes.badge {
            active.badge = Set(badge);
        }
        if let Some(images) = changes.images {
            active.images = Set(json!(images));
        }

        active.update(&*self.db).await.map(Some).map_err(Into::into)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError> {
        let Some(existing) = Product::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };

        existing.clone().delete(&*self.db).await?;
        Ok(Some(existing))
    }
}

/// In-memory repository for tests and local experiments; mirrors the
/// semantics of the sea-orm implementation.
#[derive(Debug, Default)]
pub struct InMemoryProductRepository {
    items: Mutex<Vec<ProductModel>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn insert(&self, p: NewProduct) -> Result<ProductModel, ServiceError> {
        let record = ProductModel {
            id: Uuid::new_v4(),
            name: p.name,
            variant: p.variant,
            price: p.price,
            original_price: p.original_price,
            category: p.category,
            colors: json!(p.colors),
            rating: p.rating,
            reviews: p.reviews,
            is_new: p.is_new,
            badge: p.badge,
            images: json!(p.images),
            created_at: Utc::now(),
        };

        let mut items = self.items.lock().expect("repository lock poisoned");
        items.push(record.clone());
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<ProductModel>, ServiceError> {
        let items = self.items.lock().expect("repository lock poisoned");
        let mut all = items.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError> {
        let items = self.items.lock().expect("repository lock poisoned");
        Ok(items.iter().find(|m| m.id == id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<Option<ProductModel>, ServiceError> {
        let mut items = self.items.lock().expect("repository lock poisoned");
        let Some(record) = items.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            record.name = name;
        }
        if let Some(variant) = changes.variant {
            record.variant = variant;
        }
        if let Some(price) = changes.price {
            record.price = price;
        }
        if let Some(original_price) = changes.original_price {
            record.original_price = original_price;
        }
        if let Some(category) = changes.category {
            record.category = category;
        }
        if let Some(colors) = changes.colors {
            record.colors = json!(colors);
        }
        if let Some(rating) = changes.rating {
            record.rating = rating;
        }
        if let Some(reviews) = changes.reviews {
            record.reviews = reviews;
        }
        if let Some(is_new) = changes.is_new {
            record.is_new = is_new;
        }
        if let Some(badge) = changes.badge {
            record.badge = badge;
        }
        if let Some(images) = changes.images {
            record.images = json!(images);
        }

        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError> {
        let mut items = self.items.lock().expect("repository lock poisoned");
        let Some(pos) = items.iter().position(|m| m.id == id) else {
            return Ok(None);
        };
        Ok(Some(items.remove(pos)))
    }
}
