//! VFS backend implementations.

mod local;
mod memory;

pub use local::{LocalBackend, LocalFile};
pub use memory::{MemoryBackend, MemoryFile};
