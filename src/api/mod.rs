pub mod handlers;

pub use handlers::{health_check, verify_batch, verify_bill, verify_tax_id};
