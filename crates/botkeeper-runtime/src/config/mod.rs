//! Configuration for the botkeeper runtime.
//!
//! Settings are layered with figment (see [`ConfigLoader`]) into a
//! [`BotkeeperConfig`] and checked with [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotkeeperConfig, GatewayConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RuntimeConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
