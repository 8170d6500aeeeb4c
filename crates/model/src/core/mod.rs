pub mod data_type;
pub mod secret;
pub mod utils;
pub mod value;
