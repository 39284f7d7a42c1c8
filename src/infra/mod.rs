pub mod loader;
pub mod server_config;
pub mod settings;
pub mod xlsx;
