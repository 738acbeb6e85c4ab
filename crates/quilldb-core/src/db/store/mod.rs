mod data;
mod link;
mod sequence;

pub use data::{DataRegistry, DataStore, MAX_ROW_BYTES, RawRow, RawRowError};
pub use link::{LinkRow, LinkStore};
pub use sequence::SequenceRegistry;
