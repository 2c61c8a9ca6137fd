/// Configuration types for brandmatch
///
/// This module contains the process configuration, read from a JSON file
/// with camelCase keys. Every section has defaults so an empty object is a
/// valid configuration.

mod cors;
mod images;
mod logging;
mod root;

pub use cors::CorsConfig;
pub use images::ImageConfig;
pub use logging::LogConfig;
pub use root::{AppConfig, ConfigError};
