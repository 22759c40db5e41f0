//! Distribution sessions: one user distributing one document.
//!
//! A session owns its ledger outright. All mutations go through `&mut self`,
//! which is what serializes concurrent widgets editing the same document:
//! whoever holds the session is the only writer.

use tracing::{info, instrument, warn};

use stowage_core::{
    AllocationLedger, CellId, CellRef, CommitLine, DocumentId, DocumentKind, OverAllocationPolicy,
    ProductId, RackId, RackNode, RackOption, RowNode, Warehouse, WarehouseId, build_hierarchy,
    rack_options, rows_for_rack,
};

use crate::ClientError;
use crate::backend::Backend;

/// The editing state for one document.
pub struct DistributionSession<B> {
    backend: B,
    kind: DocumentKind,
    document_id: DocumentId,
    warehouse_id: Option<WarehouseId>,
    warehouse: Option<Warehouse>,
    racks: Vec<RackNode>,
    ledger: AllocationLedger,
}

impl<B: Backend> DistributionSession<B> {
    /// Open a session: fetch the document, then its warehouse.
    ///
    /// A document without a warehouse opens with an empty hierarchy; call
    /// [`Self::select_warehouse`] before allocating.
    ///
    /// # Errors
    ///
    /// Returns the backend error if either fetch fails, or
    /// `ClientError::Ledger` if the document lists a product twice.
    #[instrument(skip(backend))]
    pub async fn open(
        backend: B,
        kind: DocumentKind,
        document_id: DocumentId,
        policy: OverAllocationPolicy,
    ) -> Result<Self, ClientError> {
        let document = backend.fetch_document(kind, document_id).await?;

        let mut ledger = AllocationLedger::with_policy(policy);
        ledger.load_document(document.lines)?;

        let mut session = Self {
            backend,
            kind,
            document_id,
            warehouse_id: document.warehouse_id,
            warehouse: None,
            racks: Vec::new(),
            ledger,
        };

        if session.warehouse_id.is_some() {
            session.refresh_warehouse().await?;
        } else {
            warn!("Document has no warehouse assigned");
        }

        info!(
            lines = session.ledger.document_lines().len(),
            racks = session.racks.len(),
            "Opened distribution session"
        );
        Ok(session)
    }

    /// Switch to another warehouse. Entries recorded against the previous
    /// warehouse's cells are dropped.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the fetch fails; the session is unchanged.
    pub async fn select_warehouse(&mut self, warehouse_id: WarehouseId) -> Result<(), ClientError> {
        let warehouse = self.backend.fetch_warehouse(warehouse_id).await?;
        if self.warehouse_id != Some(warehouse_id) {
            let lines = self.ledger.document_lines().to_vec();
            self.ledger.load_document(lines)?;
        }
        self.warehouse_id = Some(warehouse_id);
        self.install(warehouse);
        Ok(())
    }

    /// Refetch the warehouse's cells and rebuild the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NoWarehouse` if none is selected, or the backend
    /// error if the fetch fails; the session is unchanged on error.
    pub async fn refresh_warehouse(&mut self) -> Result<(), ClientError> {
        let warehouse_id = self
            .warehouse_id
            .ok_or(ClientError::NoWarehouse(self.document_id))?;
        let warehouse = self.backend.fetch_warehouse(warehouse_id).await?;
        self.install(warehouse);
        Ok(())
    }

    fn install(&mut self, warehouse: Warehouse) {
        self.racks = build_hierarchy(&warehouse.cells);
        self.warehouse = Some(warehouse);
    }

    #[must_use]
    pub const fn kind(&self) -> DocumentKind {
        self.kind
    }

    #[must_use]
    pub const fn document_id(&self) -> DocumentId {
        self.document_id
    }

    #[must_use]
    pub const fn warehouse(&self) -> Option<&Warehouse> {
        self.warehouse.as_ref()
    }

    /// The ledger, for completion queries.
    #[must_use]
    pub const fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    #[must_use]
    pub fn racks(&self) -> &[RackNode] {
        &self.racks
    }

    #[must_use]
    pub fn rack_options(&self) -> Vec<RackOption> {
        rack_options(&self.racks)
    }

    #[must_use]
    pub fn rows_for_rack(&self, rack_id: RackId) -> &[RowNode] {
        rows_for_rack(&self.racks, rack_id)
    }

    /// Look up a cell of the current warehouse.
    #[must_use]
    pub fn cell(&self, cell_id: CellId) -> Option<&CellRef> {
        self.warehouse.as_ref()?.cell(cell_id)
    }

    /// Place units of a product into a cell of the current warehouse.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnknownCell` for cells outside the warehouse, or
    /// `ClientError::Ledger` if the ledger refuses the allocation.
    pub fn allocate(
        &mut self,
        product_id: ProductId,
        cell_id: CellId,
        count: u32,
    ) -> Result<u32, ClientError> {
        let slot = self
            .cell(cell_id)
            .ok_or(ClientError::UnknownCell(cell_id))?
            .slot();
        Ok(self.ledger.allocate(product_id, &slot, count)?)
    }

    /// Place several products into one cell.
    ///
    /// # Errors
    ///
    /// Same as [`Self::allocate`].
    pub fn allocate_batch<I>(&mut self, cell_id: CellId, counts: I) -> Result<u32, ClientError>
    where
        I: IntoIterator<Item = (ProductId, u32)>,
    {
        let slot = self
            .cell(cell_id)
            .ok_or(ClientError::UnknownCell(cell_id))?
            .slot();
        Ok(self.ledger.allocate_batch(&slot, counts)?)
    }

    /// Take a product back out of a cell. Returns the removed count.
    pub fn deallocate(&mut self, product_id: ProductId, cell_id: CellId) -> Option<u32> {
        self.ledger
            .deallocate(product_id, cell_id)
            .map(|entry| entry.count)
    }

    /// Submit the distribution and clear the ledger.
    ///
    /// The ledger is cleared only after the backend accepts the submission;
    /// on any error it is left exactly as it was so the user can retry.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Ledger` if the distribution is empty or
    /// incomplete, or the backend error if the submission fails.
    #[instrument(skip(self), fields(kind = %self.kind, document_id = %self.document_id))]
    pub async fn commit(&mut self) -> Result<Vec<CommitLine>, ClientError> {
        let payload = self.ledger.commit_payload()?;

        if let Err(e) = self
            .backend
            .approve_distribution(self.kind, self.document_id, &payload)
            .await
        {
            warn!(error = %e, "Distribution commit failed; ledger kept for retry");
            return Err(e);
        }

        self.ledger.clear();
        info!(lines = payload.len(), "Distribution committed");
        Ok(payload)
    }

    /// End the session and hand back the backend.
    pub fn close(mut self) -> B {
        self.ledger.clear();
        self.backend
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use stowage_core::{Document, DocumentLine, LedgerError, RowId};

    use super::*;

    struct StubBackend {
        warehouse_id: Option<WarehouseId>,
        fail_commit: bool,
        committed: Mutex<Vec<Vec<CommitLine>>>,
    }

    impl StubBackend {
        fn new(warehouse_id: Option<i32>) -> Self {
            Self {
                warehouse_id: warehouse_id.map(WarehouseId::new),
                fail_commit: false,
                committed: Mutex::new(Vec::new()),
            }
        }
    }

    fn cell(id: i32, rack: i32, row: i32) -> CellRef {
        CellRef {
            id: CellId::new(id),
            name: format!("Cell {id}"),
            code: format!("C-{id}"),
            rack: RackId::new(rack),
            row: RowId::new(row),
        }
    }

    impl Backend for StubBackend {
        async fn fetch_document(
            &self,
            kind: DocumentKind,
            id: DocumentId,
        ) -> Result<Document, ClientError> {
            Ok(Document {
                id,
                kind,
                warehouse_id: self.warehouse_id,
                lines: vec![
                    DocumentLine::new(ProductId::new(1), 4),
                    DocumentLine::new(ProductId::new(2), 1),
                ],
            })
        }

        async fn fetch_warehouse(&self, id: WarehouseId) -> Result<Warehouse, ClientError> {
            if id.as_i32() > 100 {
                return Err(ClientError::WarehouseNotFound(id));
            }
            Ok(Warehouse {
                id,
                name: format!("Warehouse {id}"),
                cells: vec![cell(id.as_i32() * 10, 1, 1), cell(id.as_i32() * 10 + 1, 2, 1)],
            })
        }

        async fn approve_distribution(
            &self,
            _kind: DocumentKind,
            _id: DocumentId,
            lines: &[CommitLine],
        ) -> Result<(), ClientError> {
            if self.fail_commit {
                return Err(ClientError::Api {
                    status: 502,
                    message: "bad gateway".to_string(),
                });
            }
            self.committed.lock().unwrap().push(lines.to_vec());
            Ok(())
        }
    }

    async fn open(backend: StubBackend) -> DistributionSession<StubBackend> {
        DistributionSession::open(
            backend,
            DocumentKind::Invoice,
            DocumentId::new(7),
            OverAllocationPolicy::Clamp,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_builds_hierarchy() {
        let session = open(StubBackend::new(Some(1))).await;
        assert_eq!(session.racks().len(), 2);
        assert_eq!(session.rack_options().len(), 2);
        assert_eq!(session.rows_for_rack(RackId::new(2)).len(), 1);
        assert_eq!(session.ledger().document_lines().len(), 2);
    }

    #[tokio::test]
    async fn test_open_without_warehouse() {
        let mut session = open(StubBackend::new(None)).await;
        assert!(session.warehouse().is_none());
        assert!(session.racks().is_empty());

        let err = session.allocate(ProductId::new(1), CellId::new(10), 1).unwrap_err();
        assert!(matches!(err, ClientError::UnknownCell(_)));

        let err = session.refresh_warehouse().await.unwrap_err();
        assert!(matches!(err, ClientError::NoWarehouse(_)));
    }

    #[tokio::test]
    async fn test_allocate_rejects_foreign_cell() {
        let mut session = open(StubBackend::new(Some(1))).await;
        let err = session.allocate(ProductId::new(1), CellId::new(99), 1).unwrap_err();
        assert!(matches!(err, ClientError::UnknownCell(id) if id == CellId::new(99)));
        assert!(session.ledger().entries().is_empty());
    }

    #[tokio::test]
    async fn test_select_warehouse_drops_entries() {
        let mut session = open(StubBackend::new(Some(1))).await;
        session.allocate(ProductId::new(1), CellId::new(10), 2).unwrap();

        session.select_warehouse(WarehouseId::new(2)).await.unwrap();
        assert!(session.ledger().entries().is_empty());
        assert!(session.cell(CellId::new(20)).is_some());
        assert!(session.cell(CellId::new(10)).is_none());
    }

    #[tokio::test]
    async fn test_select_missing_warehouse_keeps_state() {
        let mut session = open(StubBackend::new(Some(1))).await;
        session.allocate(ProductId::new(1), CellId::new(10), 2).unwrap();

        assert!(session.select_warehouse(WarehouseId::new(500)).await.is_err());
        assert_eq!(session.ledger().total_allocated(ProductId::new(1)), 2);
        assert!(session.cell(CellId::new(10)).is_some());
    }

    #[tokio::test]
    async fn test_commit_incomplete_is_refused() {
        let mut session = open(StubBackend::new(Some(1))).await;
        session.allocate(ProductId::new(1), CellId::new(10), 4).unwrap();

        let err = session.commit().await.unwrap_err();
        assert!(matches!(err, ClientError::Ledger(LedgerError::Incomplete { .. })));
        assert_eq!(session.ledger().entries().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_ledger() {
        let mut backend = StubBackend::new(Some(1));
        backend.fail_commit = true;
        let mut session = open(backend).await;
        session.allocate(ProductId::new(1), CellId::new(10), 4).unwrap();
        session.allocate(ProductId::new(2), CellId::new(11), 1).unwrap();

        let err = session.commit().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(session.ledger().entries().len(), 2);
        assert!(session.ledger().is_document_fully_allocated());
    }

    #[tokio::test]
    async fn test_commit_clears_ledger() {
        let mut session = open(StubBackend::new(Some(1))).await;
        session.allocate(ProductId::new(1), CellId::new(10), 4).unwrap();
        session.allocate(ProductId::new(2), CellId::new(11), 1).unwrap();

        let payload = session.commit().await.unwrap();
        assert_eq!(payload.len(), 2);
        assert!(session.ledger().entries().is_empty());

        let backend = session.close();
        assert_eq!(backend.committed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deallocate_returns_removed_count() {
        let mut session = open(StubBackend::new(Some(1))).await;
        session
            .allocate_batch(CellId::new(10), [(ProductId::new(1), 3), (ProductId::new(2), 1)])
            .unwrap();
        assert_eq!(session.deallocate(ProductId::new(1), CellId::new(10)), Some(3));
        assert_eq!(session.deallocate(ProductId::new(1), CellId::new(10)), None);
    }
}
