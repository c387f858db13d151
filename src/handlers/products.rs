use crate::handlers::common::{
    created_response, no_content_response, parse_id, success_response,
};
use crate::repositories::ProductChanges;
use crate::uploads::{UploadedImage, MAX_FILES_PER_REQUEST, MAX_FILE_BYTES};
use crate::{errors::ServiceError, services::CreateProductInput, AppState};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    extract::rejection::JsonRejection,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Multipart field that carries the image files.
const IMAGES_FIELD: &str = "images";

/// Whole-request ceiling: ten files at the per-file limit plus form overhead.
const MAX_UPLOAD_BODY_BYTES: usize = MAX_FILES_PER_REQUEST * MAX_FILE_BYTES + 1024 * 1024;

fn normalize_string(value: String) -> String {
    value.trim().to_string()
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .and_then(|v| if v.is_empty() { None } else { Some(v) })
}

fn ensure_decimal_non_negative(value: &Decimal, field: &str) -> Result<(), ServiceError> {
    if *value < Decimal::ZERO {
        Err(ServiceError::ValidationError(format!(
            "{field} cannot be negative"
        )))
    } else {
        Ok(())
    }
}

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
}

/// Product record as returned to clients
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub variant: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    pub category: String,
    pub colors: Vec<String>,
    pub rating: f32,
    pub reviews: i32,
    pub is_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<crate::entities::ProductModel> for ProductResponse {
    fn from(model: crate::entities::ProductModel) -> Self {
        let colors = model.color_list();
        let images = model.image_files();
        Self {
            id: model.id,
            name: model.name,
            variant: model.variant,
            price: model.price,
            original_price: model.original_price,
            category: model.category,
            colors,
            rating: model.rating,
            reviews: model.reviews,
            is_new: model.is_new,
            badge: model.badge,
            images,
            created_at: model.created_at,
        }
    }
}

/// Partial update payload. Only the listed fields are mutable; unknown keys
/// are rejected rather than merged in.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub variant: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub category: Option<String>,
    pub colors: Option<Vec<String>>,
    pub rating: Option<f32>,
    pub reviews: Option<i32>,
    pub is_new: Option<bool>,
    pub badge: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Text fields and files read out of a multipart create request. Field
/// values keep their submission order so repeated fields stay meaningful.
#[derive(Debug, Default)]
struct ProductForm {
    fields: Vec<(String, String)>,
    images: Vec<UploadedImage>,
}

impl ProductForm {
    fn first(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn all(&self, key: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<ProductForm, ServiceError> {
    let mut form = ProductForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(ServiceError::ValidationError(format!(
                    "malformed multipart body: {}",
                    e
                )));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());

        if let Some(original_name) = file_name {
            if name != IMAGES_FIELD {
                return Err(ServiceError::ValidationError(format!(
                    "unexpected file field '{}'",
                    name
                )));
            }
            let bytes = field.bytes().await.map_err(|e| {
                ServiceError::ValidationError(format!(
                    "failed to read uploaded file '{}': {}",
                    original_name, e
                ))
            })?;
            form.images.push(UploadedImage {
                original_name,
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await.map_err(|e| {
                ServiceError::ValidationError(format!("failed to read field '{}': {}", name, e))
            })?;
            form.fields.push((name, value));
        }
    }

    Ok(form)
}

fn require_text(form: &ProductForm, key: &str) -> Result<String, ServiceError> {
    let value = form
        .first(key)
        .map(|v| normalize_string(v.to_string()))
        .unwrap_or_default();
    if value.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "'{}' is required",
            key
        )));
    }
    Ok(value)
}

/// Colors arrive either as one JSON-encoded array or as repeated plain-text
/// fields; a lone value that fails to parse as JSON counts as one color.
fn parse_colors(form: &ProductForm) -> Vec<String> {
    let values = form.all("colors");
    if let &[single] = values.as_slice() {
        if let Ok(parsed) = serde_json::from_str::<Vec<String>>(single) {
            return parsed;
        }
    }
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Coerces loosely-typed form text into a validated create input.
fn coerce_create_input(form: &ProductForm) -> Result<CreateProductInput, ServiceError> {
    let name = require_text(form, "name")?;
    let variant = require_text(form, "variant")?;
    let category = require_text(form, "category")?;

    let price = form
        .first("price")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::ValidationError("'price' is required".to_string()))
        .and_then(|v| {
            Decimal::from_str(v).map_err(|_| {
                ServiceError::ValidationError("'price' must be a number".to_string())
            })
        })?;
    ensure_decimal_non_negative(&price, "price")?;

    let original_price = form
        .first("originalPrice")
        .and_then(|v| Decimal::from_str(v.trim()).ok());

    let rating = form
        .first("rating")
        .and_then(|v| v.trim().parse::<f32>().ok())
        .unwrap_or(0.0);
    let reviews = form
        .first("reviews")
        .and_then(|v| v.trim().parse::<i32>().ok())
        .unwrap_or(0);

    // True only for the literal text "true"; anything else is false.
    let is_new = form.first("isNew") == Some("true");

    let badge = normalize_optional_string(form.first("badge").map(str::to_string));

    Ok(CreateProductInput {
        name,
        variant,
        price,
        original_price,
        category,
        colors: parse_colors(form),
        rating,
        reviews,
        is_new,
        badge,
    })
}

/// Create a new product from a multipart form with 2-10 image files
#[utoipa::path(
    post,
    path = "/api/products",
    request_body(content = String, content_type = "multipart/form-data",
        description = "Text fields (name, variant, price, originalPrice, category, colors, rating, reviews, isNew, badge) plus 2-10 files in the 'images' field"),
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let form = read_multipart(multipart).await?;
    let input = coerce_create_input(&form)?;

    let product = state
        .services
        .products
        .create_product(input, form.images)
        .await?;

    Ok(created_response(ProductResponse::from(product)))
}

/// List all products, newest first
#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Products retrieved", body = [ProductResponse]),
        (status = 500, description = "Storage failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let products = state.services.products.list_products().await?;
    let products: Vec<ProductResponse> = products.into_iter().map(ProductResponse::from).collect();
    Ok(success_response(products))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved", body = ProductResponse),
        (status = 400, description = "Malformed ID", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let id = parse_id(&id)?;
    let product = state.services.products.get_product(id).await?;
    Ok(success_response(ProductResponse::from(product)))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let id = parse_id(&id)?;
    let Json(payload) =
        payload.map_err(|e| ServiceError::ValidationError(e.body_text()))?;

    let name = payload
        .name
        .map(normalize_string)
        .map(|value| {
            if value.is_empty() {
                Err(ServiceError::ValidationError(
                    "'name' cannot be blank".to_string(),
                ))
            } else {
                Ok(value)
            }
        })
        .transpose()?;

    let variant = payload
        .variant
        .map(normalize_string)
        .map(|value| {
            if value.is_empty() {
                Err(ServiceError::ValidationError(
                    "'variant' cannot be blank".to_string(),
                ))
            } else {
                Ok(value)
            }
        })
        .transpose()?;

    let category = payload
        .category
        .map(normalize_string)
        .map(|value| {
            if value.is_empty() {
                Err(ServiceError::ValidationError(
                    "'category' cannot be blank".to_string(),
                ))
            } else {
                Ok(value)
            }
        })
        .transpose()?;

    if let Some(ref value) = payload.price {
        ensure_decimal_non_negative(value, "price")?;
    }

    let changes = ProductChanges {
        name,
        variant,
        price: payload.price,
        original_price: payload.original_price.map(Some),
        category,
        colors: payload.colors,
        rating: payload.rating,
        reviews: payload.reviews,
        is_new: payload.is_new,
        badge: normalize_optional_string(payload.badge).map(Some),
        images: payload.images,
    };

    let product = state.services.products.update_product(id, changes).await?;
    Ok(success_response(ProductResponse::from(product)))
}

/// Delete a product and best-effort remove its image files
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, description = "Malformed ID", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let id = parse_id(&id)?;
    state.services.products.delete_product(id).await?;
    Ok(no_content_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> ProductForm {
        ProductForm {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            images: Vec::new(),
        }
    }

    fn valid_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            ("name", "Aviator Classic"),
            ("variant", "Gold / Green"),
            ("price", "149.99"),
            ("category", "aviator"),
        ]
    }

    #[test]
    fn coerces_a_minimal_valid_form() {
        let input = coerce_create_input(&form(&valid_fields())).unwrap();
        assert_eq!(input.name, "Aviator Classic");
        assert_eq!(input.price, Decimal::from_str("149.99").unwrap());
        assert_eq!(input.rating, 0.0);
        assert_eq!(input.reviews, 0);
        assert!(!input.is_new);
        assert!(input.colors.is_empty());
        assert!(input.badge.is_none());
        assert!(input.original_price.is_none());
    }

    #[test]
    fn missing_required_field_fails_validation() {
        for dropped in ["name", "variant", "category", "price"] {
            let fields: Vec<_> = valid_fields()
                .into_iter()
                .filter(|(k, _)| *k != dropped)
                .collect();
            let err = coerce_create_input(&form(&fields)).unwrap_err();
            assert!(matches!(err, ServiceError::ValidationError(_)), "{dropped}");
        }
    }

    #[test]
    fn blank_required_field_fails_validation() {
        let mut fields = valid_fields();
        fields.push(("name", "ignored duplicate"));
        fields[0] = ("name", "   ");
        let err = coerce_create_input(&form(&fields)).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn unparseable_price_fails_validation() {
        let mut fields = valid_fields();
        fields[2] = ("price", "cheap");
        let err = coerce_create_input(&form(&fields)).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn colors_accepts_json_encoded_array() {
        let mut fields = valid_fields();
        fields.push(("colors", r#"["black","blue"]"#));
        let input = coerce_create_input(&form(&fields)).unwrap();
        assert_eq!(input.colors, vec!["black", "blue"]);
    }

    #[test]
    fn colors_accepts_repeated_fields() {
        let mut fields = valid_fields();
        fields.push(("colors", "black"));
        fields.push(("colors", "tortoise"));
        let input = coerce_create_input(&form(&fields)).unwrap();
        assert_eq!(input.colors, vec!["black", "tortoise"]);
    }

    #[test]
    fn is_new_requires_the_literal_text_true() {
        for (value, expected) in [("true", true), ("1", false), ("True", false), ("", false)] {
            let mut fields = valid_fields();
            fields.push(("isNew", value));
            let input = coerce_create_input(&form(&fields)).unwrap();
            assert_eq!(input.is_new, expected, "value: {value:?}");
        }
    }

    #[test]
    fn rating_and_reviews_default_to_zero_when_unparseable() {
        let mut fields = valid_fields();
        fields.push(("rating", "many"));
        fields.push(("reviews", "lots"));
        let input = coerce_create_input(&form(&fields)).unwrap();
        assert_eq!(input.rating, 0.0);
        assert_eq!(input.reviews, 0);
    }

    #[test]
    fn unparseable_original_price_is_dropped() {
        let mut fields = valid_fields();
        fields.push(("originalPrice", "n/a"));
        let input = coerce_create_input(&form(&fields)).unwrap();
        assert!(input.original_price.is_none());
    }

    #[test]
    fn update_request_rejects_unknown_keys() {
        let result: Result<UpdateProductRequest, _> =
            serde_json::from_str(r#"{"name":"x","admin":true}"#);
        assert!(result.is_err());
    }
}
