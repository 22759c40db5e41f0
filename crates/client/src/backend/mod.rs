//! Warehouse backend collaborators.
//!
//! The [`Backend`] trait is the seam between distribution sessions and the
//! network: it fetches documents and warehouses and submits the approved
//! distribution. [`HttpBackend`] implements it over the REST API; tests
//! substitute in-memory implementations.

pub mod http;
pub mod wire;

pub use http::HttpBackend;

use std::future::Future;

use stowage_core::{CommitLine, Document, DocumentId, DocumentKind, Warehouse, WarehouseId};

use crate::ClientError;

/// Capabilities a distribution session needs from the backend.
pub trait Backend {
    /// Fetch a document and its lines.
    fn fetch_document(
        &self,
        kind: DocumentKind,
        id: DocumentId,
    ) -> impl Future<Output = Result<Document, ClientError>> + Send;

    /// Fetch a warehouse with its full cell list.
    fn fetch_warehouse(
        &self,
        id: WarehouseId,
    ) -> impl Future<Output = Result<Warehouse, ClientError>> + Send;

    /// Submit the final distribution of a document.
    fn approve_distribution(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        lines: &[CommitLine],
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}
