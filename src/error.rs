//! Error types for the key-space engine.
//!
//! Only misconfiguration is fatal. Filters that cannot be fully analysed are
//! never errors: extraction degrades to wider bounds and the plan carries a
//! residual filter instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyspaceError {
    /// The schema lacks an attribute the requested index needs.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A query without spatial or temporal predicates would scan the whole
    /// table and the caller did not opt in.
    #[error("Full table scan of '{type_name}' blocked; set allow_full_scan to override")]
    FullScanBlocked { type_name: String },

    /// Bad coordinates, dates or other values on the write path.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KeyspaceError>;
