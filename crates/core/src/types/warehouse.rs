//! Warehouse snapshot types.

use serde::{Deserialize, Serialize};

use super::id::{CellId, RackId, RowId, WarehouseId};

/// Immutable identity of a physical storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub id: CellId,
    pub name: String,
    /// Short code printed on the cell label.
    pub code: String,
    pub rack: RackId,
    pub row: RowId,
}

impl CellRef {
    /// The display identity the ledger records alongside each entry.
    #[must_use]
    pub fn slot(&self) -> CellSlot {
        CellSlot::from(self)
    }
}

/// A warehouse and its flat cell list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    #[serde(default)]
    pub cells: Vec<CellRef>,
}

impl Warehouse {
    /// Look up a cell by id.
    #[must_use]
    pub fn cell(&self, id: CellId) -> Option<&CellRef> {
        self.cells.iter().find(|cell| cell.id == id)
    }
}

/// The part of a cell an allocation entry carries: its id plus the code and
/// name used when listing what sits in the cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellSlot {
    pub id: CellId,
    pub code: String,
    pub name: String,
}

impl CellSlot {
    #[must_use]
    pub fn new(id: CellId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
        }
    }
}

impl From<&CellRef> for CellSlot {
    fn from(cell: &CellRef) -> Self {
        Self {
            id: cell.id,
            code: cell.code.clone(),
            name: cell.name.clone(),
        }
    }
}
