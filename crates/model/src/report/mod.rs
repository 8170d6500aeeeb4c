pub mod manifest;
pub mod stats;
pub mod summary;
