//! TCP listener that serves every accepted client on its own thread.
//!
//! Shutdown is cooperative: a [`ShutdownHandle`] raises a flag and then
//! connects to the listener once so the blocked `accept` returns and sees it.
use std::{
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::store::{StoreBackend, StoreGuard};

use super::{connection::handle_connection, thread::Workers};

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: io::Error,
    },
    #[error("server IO error: {0}")]
    Io(#[from] io::Error),
}

/// Accepts clients and serves each on its own thread against a shared
/// [`StoreGuard`].
pub struct SqlServer<B: StoreBackend + 'static> {
    listener: TcpListener,
    address: SocketAddr,
    guard: Arc<StoreGuard<B>>,
    shutdown: ShutdownHandle,
}

/// Stops a running [`SqlServer`] from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    address: SocketAddr,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutdown requested");

        // The accept loop only checks the flag between connections.
        let wake = wake_address(self.address);
        if let Err(e) = TcpStream::connect_timeout(&wake, WAKE_TIMEOUT) {
            debug!("failed to wake listener at {wake}: {e}");
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl<B: StoreBackend + 'static> SqlServer<B> {
    pub fn bind(address: SocketAddr, guard: StoreGuard<B>) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(address).map_err(|source| ServerError::Bind { address, source })?;
        let address = listener.local_addr()?;

        Ok(Self {
            listener,
            address,
            guard: Arc::new(guard),
            shutdown: ShutdownHandle {
                requested: Arc::new(AtomicBool::new(false)),
                address,
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept connections until shutdown is triggered.
    pub fn serve(self) -> Result<(), ServerError> {
        info!("listening at {}", self.address);
        let mut workers = Workers::new();

        for stream in self.listener.incoming() {
            if self.shutdown.is_triggered() {
                break;
            }

            match stream {
                Ok(stream) => {
                    let guard = Arc::clone(&self.guard);
                    let control = match stream.try_clone() {
                        Ok(control) => control,
                        Err(e) => {
                            warn!("failed to prepare connection: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = workers.spawn(control, move || serve_client(stream, &guard)) {
                        warn!("failed to start connection worker: {e}");
                    }
                }
                Err(e) => warn!("broken connection: {e:?}"),
            }
        }

        info!("closing {} open connection(s)", workers.len());
        workers.shutdown();
        info!("server stopped");
        Ok(())
    }
}

fn serve_client<B: StoreBackend>(stream: TcpStream, guard: &StoreGuard<B>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown peer".to_string());
    info!("client connected from {peer}");

    match handle_connection(&stream, guard) {
        Ok(answered) => info!("client {peer} disconnected after {answered} statement(s)"),
        Err(e) => warn!("closing connection to {peer}: {e}"),
    }

    // The worker registry holds a clone of this socket, so dropping `stream`
    // alone would not close it.
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        debug!("connection to {peer} already closed: {e}");
    }
}

fn wake_address(address: SocketAddr) -> SocketAddr {
    match address.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), address.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), address.port())
        }
        _ => address,
    }
}
