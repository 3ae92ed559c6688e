pub mod repository;
pub use repository::{ProductRepository, StockRepository, Store, UserRepository};
pub mod memory_store;
pub use memory_store::MemoryStore;
pub mod pg_store;
pub use pg_store::PgStore;
