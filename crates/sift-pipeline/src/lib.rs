//! Compiles normalized list queries into a single aggregation pipeline that
//! returns one page of documents together with the total match count.

mod builder;
mod collection;
mod error;
mod page;
pub mod stage;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use builder::PipelineBuilder;
pub use collection::Collection;
pub use error::PipelineError;
pub use page::Page;
