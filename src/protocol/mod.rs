//! Wire protocol of the agent server

pub mod messages;

pub use messages::*;
