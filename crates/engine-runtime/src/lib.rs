pub mod error;
pub mod execution;
pub mod state;

pub use execution::pipeline::Pipeline;
