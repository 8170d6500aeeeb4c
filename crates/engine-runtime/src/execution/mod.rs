pub mod ingest;
pub mod pipeline;
