//! Framed text exchange shared by the server and the client.
use std::io::{self, Read, Write};

use thiserror::Error;

use super::{
    Response,
    frame::{self, Framer},
    response::ResponseError,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to decode response: {0}")]
    Decode(#[from] ResponseError),
    #[error("connection closed by peer")]
    Closed,
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

/// Framed request/response exchange over a byte stream.
pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
    framer: Framer,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            framer: Framer::new(),
        }
    }

    /// Next statement text sent by the client, or `None` once the client
    /// has stopped sending.
    pub fn read_request(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.framer.next_message(&mut self.stream)?)
    }

    pub fn write_response(&mut self, resp: &Response) -> Result<(), TransportError> {
        frame::write_frame(&mut self.stream, &resp.encode())?;
        Ok(())
    }

    pub fn write_request(&mut self, statement: &str) -> Result<(), TransportError> {
        frame::write_frame(&mut self.stream, statement)?;
        Ok(())
    }

    pub fn read_response(&mut self) -> Result<Response, TransportError> {
        let line = self
            .framer
            .next_message(&mut self.stream)?
            .ok_or(TransportError::Closed)?;
        Ok(Response::decode(&line)?)
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }
}
