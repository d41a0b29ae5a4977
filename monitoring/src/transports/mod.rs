//! Transports that carry encoded metrics to their destination.

use std::io;

use thiserror::Error;

mod udp;
pub use self::udp::UdpTransport;

/// Errors that could occur while setting up a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote address could not be resolved.
    #[error("failed to resolve '{address}': {source}")]
    Resolve {
        /// Address that was being resolved.
        address: String,

        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// The remote address resolved, but not to any IPv4 address.
    #[error("'{address}' did not resolve to any IPv4 address")]
    NoAddress {
        /// Address that was being resolved.
        address: String,
    },

    /// The local socket could not be created.
    #[error("failed to bind local socket: {0}")]
    Bind(#[source] io::Error),
}

/// Carries encoded payloads to a destination.
///
/// Transports are fire-and-forget: a successful return means the payload was handed off, not that it arrived.
pub trait Transport: Send {
    /// Sends a single payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload could not be handed to the operating system.
    fn send(&mut self, payload: &[u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        (**self).send(payload)
    }
}
