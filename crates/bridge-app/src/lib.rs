pub mod config;
pub mod runtime;

pub use config::BridgeConfig;
