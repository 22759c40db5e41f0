//! Integration tests for Stowage.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stowage-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `distribution_session` - Sessions driven end to end over [`InMemoryBackend`]
//! - `marketplace_relay` - Relay passes against a local [`http_stub::HttpStub`]
//! - `http_backend` - The REST backend client against the same stub
//!
//! No external services are needed: sessions use an in-memory backend and
//! the HTTP clients talk to a stub bound on localhost.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod http_stub;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stowage_client::{Backend, ClientError};
use stowage_core::{
    CellId, CellRef, CommitLine, Document, DocumentId, DocumentKind, DocumentLine, ProductId,
    RackId, RowId, Warehouse, WarehouseId,
};

/// A commit the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub kind: DocumentKind,
    pub document_id: DocumentId,
    pub lines: Vec<CommitLine>,
}

#[derive(Default)]
struct State {
    documents: HashMap<(DocumentKind, DocumentId), Document>,
    warehouses: HashMap<WarehouseId, Warehouse>,
    commits: Vec<RecordedCommit>,
    failing_commits: usize,
    fetches: usize,
}

/// Backend double holding documents and warehouses in memory.
///
/// Clones share state, so a test can keep a handle while a session owns
/// another.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a document. `lines` are `(product, required)` pairs.
    #[must_use]
    pub fn with_document(
        self,
        kind: DocumentKind,
        id: i32,
        warehouse: Option<i32>,
        lines: &[(i32, u32)],
    ) -> Self {
        let document = Document {
            id: DocumentId::new(id),
            kind,
            warehouse_id: warehouse.map(WarehouseId::new),
            lines: lines
                .iter()
                .map(|&(product, required)| DocumentLine::new(ProductId::new(product), required))
                .collect(),
        };
        self.state().documents.insert((kind, document.id), document);
        self
    }

    /// Register a warehouse. `cells` are `(cell, rack, row)` triples.
    #[must_use]
    pub fn with_warehouse(self, id: i32, cells: &[(i32, i32, i32)]) -> Self {
        let warehouse = Warehouse {
            id: WarehouseId::new(id),
            name: format!("Warehouse {id}"),
            cells: cells
                .iter()
                .map(|&(cell, rack, row)| cell_ref(cell, rack, row))
                .collect(),
        };
        self.state().warehouses.insert(warehouse.id, warehouse);
        self
    }

    /// Replace a warehouse's cells, as if they were edited elsewhere.
    pub fn set_cells(&self, id: i32, cells: &[(i32, i32, i32)]) {
        if let Some(warehouse) = self.state().warehouses.get_mut(&WarehouseId::new(id)) {
            warehouse.cells = cells
                .iter()
                .map(|&(cell, rack, row)| cell_ref(cell, rack, row))
                .collect();
        }
    }

    /// Make the next `count` commits fail with a gateway error.
    pub fn fail_next_commits(&self, count: usize) {
        self.state().failing_commits = count;
    }

    #[must_use]
    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.state().commits.clone()
    }

    /// Number of document and warehouse fetches served.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.state().fetches
    }
}

/// A cell with a code derived from its position.
#[must_use]
pub fn cell_ref(id: i32, rack: i32, row: i32) -> CellRef {
    CellRef {
        id: CellId::new(id),
        name: format!("Cell {id}"),
        code: format!("{rack}-{row}-{id}"),
        rack: RackId::new(rack),
        row: RowId::new(row),
    }
}

impl Backend for InMemoryBackend {
    async fn fetch_document(
        &self,
        kind: DocumentKind,
        id: DocumentId,
    ) -> Result<Document, ClientError> {
        let mut state = self.state();
        state.fetches += 1;
        state
            .documents
            .get(&(kind, id))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("{kind}/{id}")))
    }

    async fn fetch_warehouse(&self, id: WarehouseId) -> Result<Warehouse, ClientError> {
        let mut state = self.state();
        state.fetches += 1;
        state
            .warehouses
            .get(&id)
            .cloned()
            .ok_or(ClientError::WarehouseNotFound(id))
    }

    async fn approve_distribution(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        lines: &[CommitLine],
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(ClientError::Api {
                status: 502,
                message: "upstream unavailable".to_string(),
            });
        }
        state.commits.push(RecordedCommit {
            kind,
            document_id: id,
            lines: lines.to_vec(),
        });
        Ok(())
    }
}
