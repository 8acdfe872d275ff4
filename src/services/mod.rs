// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod warehouse;

pub use cache::{CacheKey, CacheStats, LocationCache};
pub use memory::InMemoryWarehouse;
pub use postgres::PostgresWarehouse;
pub use warehouse::{with_timeout, Warehouse, WarehouseError};
