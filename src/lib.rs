pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use config::AppConfig;
pub use db::{connect_store, create_pool, BillStore, MemoryBillStore, PgBillStore};
pub use error::{IntakeError, StoreError};
pub use service::FraudCheckService;
