pub mod api;
pub mod config;
pub mod error;
pub mod monitor;

pub use config::MonitorConfig;
pub use error::MonitorError;
