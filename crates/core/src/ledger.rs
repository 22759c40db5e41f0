//! Allocation ledger: which units of which product sit in which cell.
//!
//! A ledger belongs to exactly one distribution session. It holds the
//! document's lines (the per-product targets) and the allocation entries
//! recorded so far, and answers completion queries by recomputing them from
//! the entries on every call.
//!
//! # Invariants
//!
//! - At most one entry per `(product, cell)` pair; allocating to an existing
//!   pair adds to its count.
//! - No entry ever has a count of zero.
//! - Under [`OverAllocationPolicy::Clamp`] and [`OverAllocationPolicy::Reject`]
//!   the allocated total of a product never exceeds its required count.
//!
//! # Example
//!
//! ```
//! use stowage_core::{AllocationLedger, CellId, CellSlot, DocumentLine, ProductId};
//!
//! let mut ledger = AllocationLedger::new();
//! ledger.load_document(vec![DocumentLine::new(ProductId::new(1), 5)])?;
//!
//! let cell = CellSlot::new(CellId::new(10), "A-1-10", "Cell 10");
//! ledger.allocate(ProductId::new(1), &cell, 3)?;
//! assert_eq!(ledger.remaining(ProductId::new(1)), 2);
//! assert!(!ledger.is_document_fully_allocated());
//! # Ok::<(), stowage_core::LedgerError>(())
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{CellId, CellSlot, DocumentLine, ProductId};

/// Errors returned by ledger mutations and the commit gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The same product appears on more than one document line.
    #[error("product {0} appears on more than one document line")]
    DuplicateLine(ProductId),

    /// An allocation would push a product past its required count.
    #[error("cannot allocate {requested} of product {product_id}: only {remaining} remaining")]
    OverAllocation {
        product_id: ProductId,
        requested: u32,
        remaining: u32,
    },

    /// The document has no lines, so there is nothing to commit.
    #[error("document has no lines to distribute")]
    EmptyDocument,

    /// Some products still have units left to allocate.
    #[error("{} product(s) not fully allocated", .undistributed.len())]
    Incomplete { undistributed: Vec<ProductId> },
}

/// What `allocate` does when a request exceeds the product's remaining count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverAllocationPolicy {
    /// Merge the full request; the product simply reports zero remaining.
    Permit,
    /// Apply only as many units as remain.
    #[default]
    Clamp,
    /// Refuse the request and leave the ledger unchanged.
    Reject,
}

impl std::fmt::Display for OverAllocationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permit => write!(f, "permit"),
            Self::Clamp => write!(f, "clamp"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for OverAllocationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permit" => Ok(Self::Permit),
            "clamp" => Ok(Self::Clamp),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("invalid over-allocation policy: {s}")),
        }
    }
}

/// Units of one product placed in one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub product_id: ProductId,
    pub cell_id: CellId,
    /// Cell code, kept for listing a cell's contents.
    pub cell_code: String,
    /// Cell name, kept for listing a cell's contents.
    pub cell_name: String,
    pub count: u32,
}

/// One line of the payload submitted when a distribution is approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLine {
    pub product_id: ProductId,
    pub cell_id: CellId,
    pub count: u32,
}

impl From<&AllocationEntry> for CommitLine {
    fn from(entry: &AllocationEntry) -> Self {
        Self {
            product_id: entry.product_id,
            cell_id: entry.cell_id,
            count: entry.count,
        }
    }
}

/// Allocation state of one document line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineProgress {
    pub product_id: ProductId,
    pub required: u32,
    pub allocated: u32,
    pub remaining: u32,
}

impl LineProgress {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.allocated >= self.required
    }
}

/// In-memory allocation table for one document.
#[derive(Debug, Clone, Default)]
pub struct AllocationLedger {
    policy: OverAllocationPolicy,
    lines: Vec<DocumentLine>,
    entries: Vec<AllocationEntry>,
}

impl AllocationLedger {
    /// Create an empty ledger with the default [`OverAllocationPolicy::Clamp`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ledger with the given over-allocation policy.
    #[must_use]
    pub const fn with_policy(policy: OverAllocationPolicy) -> Self {
        Self {
            policy,
            lines: Vec::new(),
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> OverAllocationPolicy {
        self.policy
    }

    #[must_use]
    pub fn document_lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[AllocationEntry] {
        &self.entries
    }

    /// Replace the document lines without touching existing entries.
    ///
    /// Entries left over from a previous document survive this call; use
    /// [`Self::load_document`] when switching documents.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateLine`] if a product appears twice.
    /// The ledger is unchanged on error.
    pub fn set_document_lines(&mut self, lines: Vec<DocumentLine>) -> Result<(), LedgerError> {
        check_unique(&lines)?;
        self.lines = lines;
        Ok(())
    }

    /// Start a new document: drop all entries and replace the lines.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateLine`] if a product appears twice.
    /// The ledger is unchanged on error.
    pub fn load_document(&mut self, lines: Vec<DocumentLine>) -> Result<(), LedgerError> {
        check_unique(&lines)?;
        debug!(lines = lines.len(), "Loading document into ledger");
        self.entries.clear();
        self.lines = lines;
        Ok(())
    }

    /// Place `count` units of a product into a cell.
    ///
    /// A zero count is a no-op. An existing entry for the same product and
    /// cell has its count increased; otherwise a new entry is appended.
    /// Returns the number of units actually applied, which is lower than
    /// `count` when the ledger clamps.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::OverAllocation`] under
    /// [`OverAllocationPolicy::Reject`] when `count` exceeds the remaining
    /// units. The ledger is unchanged on error.
    pub fn allocate(
        &mut self,
        product_id: ProductId,
        cell: &CellSlot,
        count: u32,
    ) -> Result<u32, LedgerError> {
        if count == 0 {
            return Ok(0);
        }

        let applied = self.admit(product_id, count)?;
        if applied == 0 {
            return Ok(0);
        }

        self.merge(product_id, cell, applied);
        Ok(applied)
    }

    /// Place several products into one cell.
    ///
    /// Zero counts are skipped. Under [`OverAllocationPolicy::Reject`] the
    /// whole batch is checked before anything is applied, so a rejected
    /// batch leaves the ledger unchanged. Returns the total units applied.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::OverAllocation`] for the first product whose
    /// request exceeds its remaining units under the reject policy.
    pub fn allocate_batch<I>(&mut self, cell: &CellSlot, counts: I) -> Result<u32, LedgerError>
    where
        I: IntoIterator<Item = (ProductId, u32)>,
    {
        let counts: Vec<(ProductId, u32)> =
            counts.into_iter().filter(|(_, count)| *count > 0).collect();

        if self.policy == OverAllocationPolicy::Reject {
            let mut requested: HashMap<ProductId, u32> = HashMap::new();
            for (product_id, count) in &counts {
                let total = requested.entry(*product_id).or_default();
                *total = total.saturating_add(*count);
                let remaining = self.remaining(*product_id);
                if *total > remaining {
                    return Err(LedgerError::OverAllocation {
                        product_id: *product_id,
                        requested: *total,
                        remaining,
                    });
                }
            }
        }

        let mut applied = 0u32;
        for (product_id, count) in counts {
            applied = applied.saturating_add(self.allocate(product_id, cell, count)?);
        }
        debug!(cell_id = %cell.id, applied, "Allocated batch into cell");
        Ok(applied)
    }

    /// Remove the entry for a product in a cell, returning it if present.
    pub fn deallocate(&mut self, product_id: ProductId, cell_id: CellId) -> Option<AllocationEntry> {
        let index = self.position(product_id, cell_id)?;
        let removed = self.entries.remove(index);
        debug!(%product_id, %cell_id, count = removed.count, "Removed allocation");
        Some(removed)
    }

    /// Drop both the document lines and all entries.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.entries.clear();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Required count for a product, 0 if the document does not list it.
    #[must_use]
    pub fn required_count(&self, product_id: ProductId) -> u32 {
        self.lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map_or(0, |line| line.required_count)
    }

    /// All entries placed in the given cell.
    #[must_use]
    pub fn entries_in_cell(&self, cell_id: CellId) -> Vec<&AllocationEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.cell_id == cell_id)
            .collect()
    }

    /// Units of a product allocated across all cells.
    #[must_use]
    pub fn total_allocated(&self, product_id: ProductId) -> u32 {
        self.entries
            .iter()
            .filter(|entry| entry.product_id == product_id)
            .fold(0u32, |sum, entry| sum.saturating_add(entry.count))
    }

    /// Units still to allocate; 0 for products not on the document.
    #[must_use]
    pub fn remaining(&self, product_id: ProductId) -> u32 {
        self.required_count(product_id)
            .saturating_sub(self.total_allocated(product_id))
    }

    /// Whether a product has reached its required count.
    ///
    /// A product missing from the document has a required count of 0 and
    /// is therefore always fully allocated.
    #[must_use]
    pub fn is_product_fully_allocated(&self, product_id: ProductId) -> bool {
        self.total_allocated(product_id) >= self.required_count(product_id)
    }

    /// Document products that reached their required count, in line order.
    #[must_use]
    pub fn fully_allocated_product_ids(&self) -> Vec<ProductId> {
        self.lines
            .iter()
            .filter(|line| self.total_allocated(line.product_id) >= line.required_count)
            .map(|line| line.product_id)
            .collect()
    }

    #[must_use]
    pub fn fully_allocated_count(&self) -> usize {
        self.fully_allocated_product_ids().len()
    }

    /// Document products with units left to allocate, in line order.
    #[must_use]
    pub fn undistributed_product_ids(&self) -> Vec<ProductId> {
        self.lines
            .iter()
            .filter(|line| self.total_allocated(line.product_id) < line.required_count)
            .map(|line| line.product_id)
            .collect()
    }

    /// True when every line is fully allocated. Vacuously true for a
    /// document without lines; [`Self::commit_payload`] refuses that case.
    #[must_use]
    pub fn is_document_fully_allocated(&self) -> bool {
        self.lines
            .iter()
            .all(|line| self.total_allocated(line.product_id) >= line.required_count)
    }

    /// Products that have at least one entry, in first-seen order.
    #[must_use]
    pub fn distinct_allocated_product_ids(&self) -> Vec<ProductId> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|entry| entry.product_id)
            .filter(|product_id| seen.insert(*product_id))
            .collect()
    }

    /// Per-line allocation state, in line order.
    #[must_use]
    pub fn progress(&self) -> Vec<LineProgress> {
        self.lines
            .iter()
            .map(|line| {
                let allocated = self.total_allocated(line.product_id);
                LineProgress {
                    product_id: line.product_id,
                    required: line.required_count,
                    allocated,
                    remaining: line.required_count.saturating_sub(allocated),
                }
            })
            .collect()
    }

    /// Project the entries into the payload submitted on approval.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EmptyDocument`] when no document is loaded and
    /// [`LedgerError::Incomplete`] while any line has units left.
    pub fn commit_payload(&self) -> Result<Vec<CommitLine>, LedgerError> {
        if self.lines.is_empty() {
            return Err(LedgerError::EmptyDocument);
        }

        let undistributed = self.undistributed_product_ids();
        if !undistributed.is_empty() {
            return Err(LedgerError::Incomplete { undistributed });
        }

        Ok(self.entries.iter().map(CommitLine::from).collect())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn position(&self, product_id: ProductId, cell_id: CellId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.product_id == product_id && entry.cell_id == cell_id)
    }

    /// Decide how many of `count` units the policy lets through.
    fn admit(&self, product_id: ProductId, count: u32) -> Result<u32, LedgerError> {
        match self.policy {
            OverAllocationPolicy::Permit => Ok(count),
            OverAllocationPolicy::Clamp => {
                let remaining = self.remaining(product_id);
                if count > remaining {
                    warn!(%product_id, requested = count, remaining, "Clamping allocation");
                }
                Ok(count.min(remaining))
            }
            OverAllocationPolicy::Reject => {
                let remaining = self.remaining(product_id);
                if count > remaining {
                    return Err(LedgerError::OverAllocation {
                        product_id,
                        requested: count,
                        remaining,
                    });
                }
                Ok(count)
            }
        }
    }

    fn merge(&mut self, product_id: ProductId, cell: &CellSlot, count: u32) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.product_id == product_id && entry.cell_id == cell.id)
        {
            entry.count = entry.count.saturating_add(count);
            debug!(%product_id, cell_id = %cell.id, count = entry.count, "Merged allocation");
        } else {
            self.entries.push(AllocationEntry {
                product_id,
                cell_id: cell.id,
                cell_code: cell.code.clone(),
                cell_name: cell.name.clone(),
                count,
            });
            debug!(%product_id, cell_id = %cell.id, count, "Added allocation");
        }
    }
}

fn check_unique(lines: &[DocumentLine]) -> Result<(), LedgerError> {
    let mut seen = HashSet::new();
    match lines.iter().find(|line| !seen.insert(line.product_id)) {
        Some(line) => Err(LedgerError::DuplicateLine(line.product_id)),
        None => Ok(()),
    }
}
