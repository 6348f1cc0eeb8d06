/// Database configuration and connection management
pub mod database;

/// Ledger settings, admin bootstrap and catalog seed from config.toml
pub mod settings;
