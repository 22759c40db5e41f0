//! Subcommand implementations.

pub mod plan;
pub mod racks;
pub mod relay;

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;

/// Read and parse a JSON input file.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Cannot parse {}: {e}", path.display()).into())
}

/// Write command output to stdout.
fn emit(output: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()
}
