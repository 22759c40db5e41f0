//! Stowage Client - Backend access, distribution sessions and the
//! marketplace order relay.
//!
//! # Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`backend`] - The [`Backend`] seam and its REST implementation
//! - [`session`] - One user distributing one document
//! - [`relay`] - Periodic import of marketplace orders into the backend
//!
//! # Example
//!
//! ```rust,ignore
//! use stowage_client::{BackendConfig, DistributionSession, HttpBackend};
//! use stowage_core::{CellId, DocumentId, DocumentKind, OverAllocationPolicy, ProductId};
//!
//! let backend = HttpBackend::new(&BackendConfig::from_env()?)?;
//! let mut session = DistributionSession::open(
//!     backend,
//!     DocumentKind::Invoice,
//!     DocumentId::new(42),
//!     OverAllocationPolicy::Clamp,
//! )
//! .await?;
//!
//! session.allocate(ProductId::new(7), CellId::new(310), 12)?;
//! if session.ledger().is_document_fully_allocated() {
//!     session.commit().await?;
//! }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod relay;
pub mod session;

pub use backend::{Backend, HttpBackend};
pub use config::{BackendConfig, ConfigError, Credentials, RelayConfig};
pub use error::ClientError;
pub use relay::{MarketplaceRelay, RelayError, RelayReport, TokenStore};
pub use session::DistributionSession;
