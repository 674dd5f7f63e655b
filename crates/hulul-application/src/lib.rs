//! Application layer for the Hulul support client.
//!
//! View models and controllers that coordinate the domain gateways: the
//! session store, the ticket list, the ticket thread and the sidebar.

pub mod navigation;
pub mod session_store;
pub mod thread;
pub mod ticket_list;
mod timeout;

pub use navigation::{NavItem, Route, Sidebar, WHATSAPP_SUPPORT_URL};
pub use session_store::{RemoteSignOut, SessionStore, SignOutOutcome, SignUpOutcome};
pub use thread::{SendOutcome, SendState, TicketThreadController, ThreadPhase, ThreadView};
pub use ticket_list::{ListPhase, TicketListView};
