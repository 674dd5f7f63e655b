pub mod config_service;
pub mod in_memory;
pub mod paths;
pub mod storage;
pub mod supabase;

pub use crate::config_service::ConfigService;
pub use crate::in_memory::{InMemoryAuthGateway, InMemoryTicketGateway, TicketOp};
pub use crate::paths::HululPaths;
pub use crate::storage::{DraftStore, FileSessionStorage, MemorySessionStorage};
pub use crate::supabase::{SupabaseAuthGateway, SupabaseClient, SupabaseTicketGateway};
