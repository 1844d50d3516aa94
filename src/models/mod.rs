pub mod bill;
pub mod result;

pub use bill::{ExtractedBill, Fingerprint, LineItem, RawBill, RawLineItem};
pub use result::{
    CheckId, CheckOutcome, FraudAssessment, RiskBand, RiskSignal, SignalKind, ValidationResult,
};
