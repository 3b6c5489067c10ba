//! Warehouse module

pub mod connection;
pub mod render;
pub mod schema;

pub use connection::{Row, Warehouse, WarehouseOptions};
pub use render::format_rows;
pub use schema::SchemaContext;
