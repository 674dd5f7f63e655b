//! Local persistence: atomic TOML files, the persisted auth record and drafts.

pub mod atomic_toml;
mod draft_store;
mod memory;
mod session_storage;

pub use atomic_toml::{AtomicTomlError, AtomicTomlFile};
pub use draft_store::{DraftStore, StoredDraft};
pub use memory::MemorySessionStorage;
pub use session_storage::FileSessionStorage;
