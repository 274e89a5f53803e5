pub mod handler;
pub mod models;
pub mod store;

pub use handler::create_catalog_router;
pub use models::{Chart, ChartCatalog, DifficultyCategory, chart_uid};
pub use store::CatalogStore;
