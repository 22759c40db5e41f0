//! `stowage plan`: replay an allocation plan against a document.
//!
//! Each allocation is applied in file order. Refused allocations are logged
//! and skipped so one bad line does not hide the rest of the report.
//! Allocations clamped down to nothing are counted apart from those that
//! placed stock.

use std::fmt::Write;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use stowage_core::{
    AllocationLedger, CellSlot, DocumentLine, LedgerError, OverAllocationPolicy, ProductId,
};

/// One line of an allocation plan.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedAllocation {
    pub product_id: ProductId,
    pub cell: CellSlot,
    pub count: u32,
}

/// How a plan's allocations fared against the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ReplaySummary {
    /// Allocations that placed at least one unit.
    applied: usize,
    /// Allocations accepted but clamped to zero units.
    skipped: usize,
    /// Allocations refused by the ledger.
    refused: usize,
    /// Units placed across all applied allocations.
    units: u32,
}

/// Replay `allocations_path` against the lines in `lines_path` and print
/// the per-product status, then the commit payload if the plan is complete.
///
/// # Errors
///
/// Returns an error if either file cannot be read or parsed, or if the
/// document lists a product twice.
pub fn replay(
    lines_path: &Path,
    allocations_path: &Path,
    policy: OverAllocationPolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let lines: Vec<DocumentLine> = super::read_json(lines_path)?;
    let allocations: Vec<PlannedAllocation> = super::read_json(allocations_path)?;

    let (ledger, summary) = apply(lines, &allocations, policy)?;
    info!(
        applied = summary.applied,
        skipped = summary.skipped,
        refused = summary.refused,
        units = summary.units,
        %policy,
        "Replayed allocation plan"
    );

    super::emit(&render(&ledger)?)?;
    Ok(())
}

/// Build a ledger from the plan.
fn apply(
    lines: Vec<DocumentLine>,
    allocations: &[PlannedAllocation],
    policy: OverAllocationPolicy,
) -> Result<(AllocationLedger, ReplaySummary), LedgerError> {
    let mut ledger = AllocationLedger::with_policy(policy);
    ledger.load_document(lines)?;

    let mut summary = ReplaySummary::default();
    for allocation in allocations {
        match ledger.allocate(allocation.product_id, &allocation.cell, allocation.count) {
            Ok(0) => {
                debug!(
                    product_id = %allocation.product_id,
                    cell_id = %allocation.cell.id,
                    requested = allocation.count,
                    "Allocation placed nothing"
                );
                summary.skipped += 1;
            }
            Ok(units) => {
                summary.applied += 1;
                summary.units = summary.units.saturating_add(units);
            }
            Err(e) => {
                warn!(
                    product_id = %allocation.product_id,
                    cell_id = %allocation.cell.id,
                    error = %e,
                    "Allocation refused"
                );
                summary.refused += 1;
            }
        }
    }
    Ok((ledger, summary))
}

fn render(ledger: &AllocationLedger) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for line in ledger.progress() {
        let status = if line.is_complete() { "done" } else { "open" };
        let _ = writeln!(
            out,
            "product {}: {}/{} allocated, {} remaining [{status}]",
            line.product_id, line.allocated, line.required, line.remaining
        );
    }

    match ledger.commit_payload() {
        Ok(payload) => {
            let _ = writeln!(out, "complete: yes");
            out.push_str(&serde_json::to_string_pretty(&payload)?);
            out.push('\n');
        }
        Err(e) => {
            let _ = writeln!(out, "complete: no ({e})");
        }
    }
    Ok(out)
}
