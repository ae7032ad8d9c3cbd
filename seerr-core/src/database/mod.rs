pub mod context;
pub mod infrastructure;
pub mod ports;
pub mod postgres;

pub use context::DatabaseContext;
pub use postgres::{DatabaseSettings, PoolSettings, PoolStats, PostgresDatabase};
