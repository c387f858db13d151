use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shades API",
        version = "0.1.0",
        description = "CRUD API for a sunglasses catalog with image uploads"
    ),
    tags(
        (name = "Products", description = "Catalog product management"),
        (name = "Uploads", description = "Stored image files")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::uploads::serve_upload,
    ),
    components(
        schemas(
            crate::handlers::products::ProductResponse,
            crate::handlers::products::UpdateProductRequest,
            crate::errors::ErrorResponse,
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
