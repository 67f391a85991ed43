//! Transport layer: framed TCP connections.

mod connection;

pub use connection::{Connection, ConnectionInfo, ConnectionSender};
