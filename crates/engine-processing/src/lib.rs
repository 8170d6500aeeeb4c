pub mod aggregation;
pub mod cleaning;
pub mod error;
