//! IPC module for front-end communication

mod protocol;
mod server;

pub use protocol::BeeperStatus;
pub use server::Server;
