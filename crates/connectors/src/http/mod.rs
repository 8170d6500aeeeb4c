pub mod extract;
pub mod retry;
pub mod settings;
pub mod source;
