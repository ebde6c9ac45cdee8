// src/catalog/mod.rs
//
// Static reference catalogs consulted during market discovery.
// Both are loaded once at startup and only read afterwards.

pub mod codes;
pub mod production;

// Re-export for convenience
pub use codes::CodeDirectory;
pub use production::ProductionTable;
