//! Per-client request/response loop.
//!
//! A connection alternates strictly: read one framed statement, run it
//! through the [`StoreGuard`], write one framed response, repeat. The loop
//! ends normally when the client stops sending. Only transport failures end
//! it early; statement failures become `ERROR:` responses and the session
//! carries on.
use std::{
    any::Any,
    io::{Read, Write},
    panic::{self, AssertUnwindSafe},
};

use log::{debug, error, warn};

use crate::{
    statement::{Statement, StatementKind},
    store::{StoreBackend, StoreGuard},
};

use super::{ProtocolTransport, Response, transport::TransportError};

/// Serve one client until it disconnects.
///
/// Returns the number of statements answered.
pub fn handle_connection<T, B>(stream: T, guard: &StoreGuard<B>) -> Result<usize, TransportError>
where
    T: Read + Write,
    B: StoreBackend,
{
    let mut transport = ProtocolTransport::new(stream);
    let mut answered = 0;

    while let Some(message) = transport.read_request()? {
        let resp = dispatch(guard, &message);
        transport.write_response(&resp)?;
        answered += 1;
    }

    Ok(answered)
}

/// Classify a message and run it against the store.
pub fn dispatch<B: StoreBackend>(guard: &StoreGuard<B>, message: &str) -> Response {
    let statement = Statement::new(message);
    debug!("received {}: {}", statement.kind(), statement.text());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match statement.kind() {
        StatementKind::Query => Response::from(guard.run_query(statement.text())),
        StatementKind::Command => Response::from(guard.run_command(statement.text())),
    }));

    match outcome {
        Ok(Response::Error(message)) => {
            warn!("statement failed: {message}");
            Response::Error(message)
        }
        Ok(resp) => resp,
        Err(payload) => {
            let reason = panic_reason(payload.as_ref());
            error!("statement '{}' panicked: {reason}", statement.text());
            Response::error(format!("internal error: {reason}"))
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
