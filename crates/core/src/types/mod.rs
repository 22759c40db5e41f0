//! Core types for Stowage.
//!
//! This module provides type-safe wrappers for the records supplied by the
//! backend: documents, their lines, warehouses and cells.

pub mod document;
pub mod id;
pub mod warehouse;

pub use document::{Document, DocumentKind, DocumentLine};
pub use id::*;
pub use warehouse::{CellRef, CellSlot, Warehouse};
