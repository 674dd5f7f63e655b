//! Ticket domain module.
//!
//! - `model`: ticket record and status
//! - `message`: thread messages and the deduplicating local log
//! - `filter`: client-side search and status filtering
//! - `gateway`: remote ticket store and its change feed

mod filter;
mod gateway;
mod message;
mod model;

pub use filter::{StatusFilter, TicketFilter};
pub use gateway::{ChangeEvent, ChangeFeedSender, ChangeKind, ChangeSubscription, TicketGateway};
pub use message::{Message, MessageLog, NewMessage};
pub use model::{Ticket, TicketStatus};
