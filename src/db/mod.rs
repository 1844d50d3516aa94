pub mod memory;
pub mod pool;
pub mod queries;
pub mod store;

pub use memory::{AuditEntry, MemoryBillStore};
pub use pool::{connect_store, create_pool};
pub use store::{BillStore, FingerprintRecord, LookbackWindow, PgBillStore, RegisterOutcome, SimilarQuery, VendorHistory};
