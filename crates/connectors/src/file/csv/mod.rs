pub mod reader;
pub mod settings;
pub mod source;
