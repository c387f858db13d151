pub mod products;

pub use products::{CreateProductInput, ProductService};
