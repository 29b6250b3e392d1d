//! Blocking client for the statement protocol.
use std::net::{TcpStream, ToSocketAddrs};

use log::debug;

use super::{ProtocolTransport, Response, transport::TransportError};

/// Blocking client: one statement in, one response out.
pub struct SqlClient {
    transport: ProtocolTransport<TcpStream>,
}

impl SqlClient {
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address)?;
        debug!("connected to {:?}", stream.peer_addr());
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            transport: ProtocolTransport::new(stream),
        }
    }

    pub fn send(&mut self, statement: &str) -> Result<Response, TransportError> {
        self.transport.write_request(statement)?;
        self.transport.read_response()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread,
    };

    use crate::store::{Field, Row};

    use super::*;

    #[test]
    fn send_waits_for_one_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut byte = [0u8; 1];
            while stream.read(&mut byte).unwrap() == 1 && byte[0] != 0 {
                received.push(byte[0]);
            }
            stream.write_all(b"SUCCESS|alice,\0").unwrap();
            received
        });

        let mut client = SqlClient::connect(address).unwrap();
        let resp = client.send("SELECT name, email FROM users").unwrap();

        assert_eq!(
            resp,
            Response::Rows(vec![Row::new(vec![Field::text("alice"), Field::text("")])])
        );
        assert_eq!(server.join().unwrap(), b"SELECT name, email FROM users");
    }

    #[test]
    fn send_reports_closed_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut client = SqlClient::connect(address).unwrap();
        server.join().unwrap();

        assert!(client.send("SELECT 1").is_err());
    }
}
