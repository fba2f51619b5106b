//! An in-process aggregation engine covering the stages the pipeline
//! builder emits, plus `$lookup`/`$unwind` for relations.

mod database;
mod error;
mod expr;
mod filter;
mod stages;
mod value;

pub use database::{MemoryCollection, MemoryDatabase};
pub use error::MemoryError;
