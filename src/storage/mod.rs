pub mod file;
pub mod memory;

pub use file::{FileCheckpointStore, FileCredentialStore};
pub use memory::{MemoryCheckpointStore, MemoryCredentialStore};
