/// Database configuration and connection management
pub mod database;

/// Runtime environment (listen address, config path)
pub mod server;

/// Shop seed configuration loading from config.toml
pub mod shop;
