//! Input/output helpers.
//!
//! - wide plate-reader CSV ingest + validation (`ingest`)
//! - merging per-sample replicate CSVs (`merge`)
//! - per-sample fit exports (`export`)
//! - curve JSON read/write (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;
pub mod merge;

pub use curve::*;
pub use export::*;
pub use ingest::*;
pub use merge::*;
