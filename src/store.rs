//! Durable key-value storage and the playback position store built on it.

mod kv;
mod position;

pub use kv::{KvStore, MemoryStore, TomlFileStore};
pub use position::PositionStore;
