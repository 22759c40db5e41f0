//! Rack → row → cell hierarchy derived from a warehouse's flat cell list.
//!
//! The hierarchy is a pure view: it is rebuilt from scratch whenever the
//! cell list changes and never patched in place. Racks appear in the order
//! their first cell appears in the input, rows in the order their first
//! cell appears within the rack, and cells keep their input order.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{CellRef, RackId, RowId};

/// A rack and the rows it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackNode {
    pub id: RackId,
    pub rows: Vec<RowNode>,
}

impl RackNode {
    /// Total number of cells across all rows of the rack.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).sum()
    }
}

/// A row within a rack and the cells assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowNode {
    pub id: RowId,
    pub cells: Vec<CellRef>,
}

/// Selection-widget entry for a rack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackOption {
    pub label: String,
    pub value: RackId,
}

/// Group a flat cell list into racks and rows.
///
/// Grouping keys are `cell.rack` and `cell.row` (within the rack). Ordering
/// follows first appearance, not numeric value.
#[must_use]
pub fn build_hierarchy(cells: &[CellRef]) -> Vec<RackNode> {
    let mut racks: Vec<RackNode> = Vec::new();
    let mut rack_index: HashMap<RackId, usize> = HashMap::new();
    let mut row_index: HashMap<(RackId, RowId), usize> = HashMap::new();

    for cell in cells {
        let rack_pos = *rack_index.entry(cell.rack).or_insert_with(|| {
            racks.push(RackNode {
                id: cell.rack,
                rows: Vec::new(),
            });
            racks.len() - 1
        });
        let Some(rack) = racks.get_mut(rack_pos) else {
            continue;
        };

        let row_pos = *row_index.entry((cell.rack, cell.row)).or_insert_with(|| {
            rack.rows.push(RowNode {
                id: cell.row,
                cells: Vec::new(),
            });
            rack.rows.len() - 1
        });
        if let Some(row) = rack.rows.get_mut(row_pos) {
            row.cells.push(cell.clone());
        }
    }

    racks
}

/// Label/value pairs for a rack picker.
#[must_use]
pub fn rack_options(racks: &[RackNode]) -> Vec<RackOption> {
    racks
        .iter()
        .map(|rack| RackOption {
            label: format!("Rack {}", rack.id),
            value: rack.id,
        })
        .collect()
}

/// Rows of the given rack, or an empty slice if no rack has that id.
#[must_use]
pub fn rows_for_rack(racks: &[RackNode], rack_id: RackId) -> &[RowNode] {
    racks
        .iter()
        .find(|rack| rack.id == rack_id)
        .map(|rack| rack.rows.as_slice())
        .unwrap_or_default()
}
