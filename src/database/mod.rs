pub mod gateway;
pub mod manager;
pub mod memory;
pub mod models;
pub mod query;
pub mod repository;
pub mod store;

pub use gateway::{GatewayError, TenantGateway, Tracked};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryRecordStore;
pub use models::record::{TenantScoped, TenantScopedRecord};
pub use repository::TenantScopedRecordRepository;
pub use store::{Change, PgRecordStore, RecordStore, UnavailableStore};
