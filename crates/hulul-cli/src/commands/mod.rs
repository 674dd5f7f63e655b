pub mod auth;
pub mod nav;
pub mod thread;
pub mod tickets;
