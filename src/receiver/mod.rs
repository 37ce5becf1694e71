pub mod http;
pub mod store;

pub use store::{compute_stats, InMemoryStore, ReadingStore, StoredReading};
