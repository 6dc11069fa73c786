//! Per-project pull request and defect metrics over a SmartSHARK entity store.

pub mod analyze;
pub mod model;
pub mod report;
pub mod store;
pub mod utils;
