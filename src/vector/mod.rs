//! Vector storage backends

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;
pub use traits::{BatchError, BatchFailure, VectorError, VectorResult, VectorStore};
