pub mod error;
pub mod factory;
pub mod file;
pub mod http;
pub mod options;
pub mod source;
