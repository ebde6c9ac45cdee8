// src/lib.rs

// 1. Data Structures (The "Nouns")
pub mod models;

// 2. Interfaces (The "Contract")
pub mod traits;

// 3. Failures
pub mod error;

// 4. Settings
pub mod config;

// 5. Reference Data (The "Catalog")
pub mod catalog;

// 6. Adapters (The "Plumbing")
pub mod connectors;

// 7. Market Discovery (The "Brains")
pub mod finder;

// 8. Console Output
pub mod report;
