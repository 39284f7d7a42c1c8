pub mod chat;
pub mod plugin;
