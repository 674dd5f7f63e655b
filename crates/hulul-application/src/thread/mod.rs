//! Ticket thread: initial load, live reconciliation and optimistic send.

mod controller;
mod view;

pub use controller::TicketThreadController;
pub use view::{
    LIVE_UPDATES_ENDED_MESSAGE, SEND_FAILED_MESSAGE, SendOutcome, SendRefusal, SendState, ThreadPhase,
    ThreadView,
};
