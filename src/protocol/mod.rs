//! Client-server communication protocol.
//!
//! Clients talk to the server over plain TCP. Each request is one SQL
//! statement and each response is one line of text; both are framed by a
//! trailing zero byte with no length prefix. The exchange alternates strictly:
//! a client sends one frame and waits for exactly one frame back.
//!
//! # Key Components
//!
//! - [`Framer`](frame::Framer): splits a byte stream into frames, keeping any
//!   bytes that arrive ahead of the current frame's sentinel.
//! - [`Response`]: the wire encoding of a store result.
//! - [`ProtocolTransport`]: framed request/response exchange over any stream.
//! - [`handle_connection`]: the per-client loop run by the server.
//! - [`SqlServer`]: accepts clients and runs each on its own thread.
//! - [`SqlClient`]: a blocking client for the same protocol.
//!
//! # Wire Format
//!
//! ```text
//! request   := statement-text NUL
//! response  := "SUCCESS: " n " rows affected" NUL
//!            | "SUCCESS|" [ row *( "|" row ) ] NUL
//!            | "ERROR: " message NUL
//! row       := field *( "," field )
//! ```
//!
//! Requests are decoded as UTF-8 with invalid sequences replaced. Field
//! values are not escaped.
//!
//! # See Also
//!
//! - [`store`](crate::store): the serialized store every statement runs against.
mod client;
mod connection;
pub mod frame;
mod response;
mod server;
mod thread;
mod transport;

pub use client::SqlClient;
pub use connection::{dispatch, handle_connection};
pub use response::{Response, ResponseError};
pub use server::{ServerError, ShutdownHandle, SqlServer};
pub use transport::{ProtocolTransport, TransportError};
