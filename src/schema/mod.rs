//! Run table ingestion
//!
//! This module reads whitespace-delimited score tables (one row per episode)
//! into runs and assembles them into groups for the engine.

mod adapter;
mod table;

pub use adapter::*;
pub use table::*;
