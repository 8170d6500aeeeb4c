pub mod aggregation;
pub mod cleaning;
pub mod errors;
pub mod rule;
