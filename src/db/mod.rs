// Durable trade storage
pub mod postgres;

pub use postgres::PostgresTradeStore;
