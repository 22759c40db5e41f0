//! Errors returned by the backend client and distribution sessions.

use thiserror::Error;

use stowage_core::{CellId, DocumentId, LedgerError, WarehouseId};

use crate::config::ConfigError;

/// Errors that can occur when talking to the warehouse backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend refused our credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered with an error.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// A ledger operation was refused.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The cell is not part of the session's warehouse.
    #[error("Cell {0} is not in the current warehouse")]
    UnknownCell(CellId),

    /// The document is not assigned to a warehouse.
    #[error("Document {0} has no warehouse assigned")]
    NoWarehouse(DocumentId),

    /// The warehouse id does not exist on the backend.
    #[error("Warehouse {0} not found")]
    WarehouseNotFound(WarehouseId),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
