pub mod config;
pub mod validated;
pub mod validator;
