//! `stowage racks`: show how a warehouse's cells group into racks and rows.

use std::fmt::Write;
use std::path::Path;

use tracing::info;

use stowage_core::{CellRef, RackId, RackNode, build_hierarchy, rack_options, rows_for_rack};

/// Print the hierarchy of the cells in `cells_path`.
///
/// With `rack`, only that rack's rows are listed.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn show(cells_path: &Path, rack: Option<RackId>) -> Result<(), Box<dyn std::error::Error>> {
    let cells: Vec<CellRef> = super::read_json(cells_path)?;
    let racks = build_hierarchy(&cells);
    info!(cells = cells.len(), racks = racks.len(), "Built hierarchy");

    let output = match rack {
        Some(rack_id) => render_rack(&racks, rack_id),
        None => render_all(&racks),
    };
    super::emit(&output)?;
    Ok(())
}

fn render_all(racks: &[RackNode]) -> String {
    let mut out = String::new();
    for (option, rack) in rack_options(racks).iter().zip(racks) {
        let _ = writeln!(
            out,
            "{} ({} rows, {} cells)",
            option.label,
            rack.rows.len(),
            rack.cell_count()
        );
        for row in &rack.rows {
            let _ = writeln!(out, "  Row {}: {}", row.id, cell_codes(&row.cells));
        }
    }
    out
}

fn render_rack(racks: &[RackNode], rack_id: RackId) -> String {
    let rows = rows_for_rack(racks, rack_id);
    if rows.is_empty() {
        return format!("Rack {rack_id} has no rows\n");
    }

    let mut out = String::new();
    for row in rows {
        let _ = writeln!(out, "Row {}: {}", row.id, cell_codes(&row.cells));
    }
    out
}

fn cell_codes(cells: &[CellRef]) -> String {
    cells
        .iter()
        .map(|cell| cell.code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
