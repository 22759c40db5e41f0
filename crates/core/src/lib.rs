//! Stowage Core - Cell hierarchy and allocation bookkeeping.
//!
//! This crate provides the types and the in-memory engine shared by all
//! Stowage components:
//! - `client` - Backend HTTP client, distribution sessions, marketplace relay
//! - `cli` - Command-line tools for inspecting warehouses and replaying plans
//!
//! # Architecture
//!
//! The core crate contains no I/O, no HTTP clients and no async code. Every
//! operation is synchronous and completes before returning, which keeps the
//! ledger safe to read and write whatever state a surrounding network call
//! is in.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, documents, warehouses and cells
//! - [`hierarchy`] - Rack → row → cell grouping of a warehouse's cells
//! - [`ledger`] - Allocation entries per `(product, cell)` and completion queries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod hierarchy;
pub mod ledger;
pub mod types;

pub use hierarchy::{RackNode, RackOption, RowNode, build_hierarchy, rack_options, rows_for_rack};
pub use ledger::{
    AllocationEntry, AllocationLedger, CommitLine, LedgerError, LineProgress,
    OverAllocationPolicy,
};
pub use types::*;
