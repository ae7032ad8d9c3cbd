//! Configuration for the Seerr data core.
//!
//! Values come from (highest precedence first) the process environment, an
//! optional `.env` file and an optional TOML file. The loaded [`Config`]
//! hands `seerr-core` its [`DatabaseSettings`](seerr_core::DatabaseSettings),
//! [`ContextOptions`](seerr_core::ContextOptions) and OIDC baseline.

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError};
pub use models::{Config, ConfigMetadata, DatabaseConfig, RuntimeConfig};
pub use validation::{ConfigWarning, ConfigWarnings};
