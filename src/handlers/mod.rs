//! Transport event handlers.

pub mod connection;
pub mod room;

pub use connection::*;
pub use room::*;
