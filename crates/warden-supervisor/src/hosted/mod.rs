//! Servers the supervisor can host on its run-loop thread.

mod greeter;

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

pub use greeter::GreetingServer;

pub(crate) const HOSTED_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::hosted");

/// A blocking server the supervisor runs on a dedicated thread.
///
/// Implementations must honour [`HostedServer::request_stop`] from any thread
/// and return from [`HostedServer::run`] promptly once asked.
pub trait HostedServer: Send + Sync {
    /// Serves until a stop is requested or a fatal error occurs.
    fn run(&self) -> Result<(), HostedServerError>;

    /// Asks a running server to return from [`HostedServer::run`].
    fn request_stop(&self);

    /// Reports whether the server is accepting requests.
    fn is_serving(&self) -> bool;
}

/// Errors reported by hosted servers.
#[derive(Debug, Error)]
pub enum HostedServerError {
    /// Resolving the bind address failed.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    /// Resolution returned no usable socket addresses.
    #[error("no socket addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to configure listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    /// Any other failure reported by a custom server.
    #[error("{message}")]
    Other { message: String },
}
