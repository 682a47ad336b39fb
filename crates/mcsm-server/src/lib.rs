pub mod config;
pub mod messager;
pub mod network;

pub use config::{ConfigError, ServerConfig};
pub use messager::Messager;
