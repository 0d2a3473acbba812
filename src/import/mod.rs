//! Bulk import of question-bank records: classify, normalize, resolve dates,
//! map categories, then create or update through a `RecordStore`.

pub mod batch;
pub mod categories;
pub mod classify;
pub mod dates;
pub mod error;
pub mod fields;
pub mod normalize;
pub mod upsert;

pub use batch::{run_batch, ImportMode, ImportOptions, ImportReport};
pub use dates::Fallback;
pub use error::{BatchError, StorageError};
pub use upsert::{IdentityKey, RecordId, RecordStore};
