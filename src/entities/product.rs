use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product entity (a single sunglasses model)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub variant: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub category: String,
    #[sea_orm(column_type = "Json")]
    pub colors: Json,
    #[sea_orm(column_type = "Float")]
    pub rating: f32,
    pub reviews: i32,
    pub is_new: bool,
    pub badge: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Color names, decoded from the JSON column.
    pub fn color_list(&self) -> Vec<String> {
        serde_json::from_value(self.colors.clone()).unwrap_or_default()
    }

    /// Stored image filenames, decoded from the JSON column.
    pub fn image_files(&self) -> Vec<String> {
        serde_json::from_value(self.images.clone()).unwrap_or_default()
    }
}
