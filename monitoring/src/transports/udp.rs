use std::{
    io,
    net::{Ipv4Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
};

use tracing::{debug, trace};

use super::{Transport, TransportError};

/// Sends each payload as a single UDP datagram.
///
/// The remote address is resolved and the local socket is bound once, at construction. Sends are never retried and
/// nothing is awaited from the remote side.
pub struct UdpTransport {
    socket: UdpSocket,
    remote_addr: SocketAddr,
}

impl UdpTransport {
    /// Creates a transport sending to `host:port`.
    ///
    /// # Errors
    ///
    /// If `host` cannot be resolved to an IPv4 address, or if the local socket cannot be bound, an error is returned.
    pub fn new(host: &str, port: u16) -> Result<Self, TransportError> {
        let address = format!("{}:{}", host, port);
        let remote_addr = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve { address: address.clone(), source })?
            .find(SocketAddr::is_ipv4)
            .ok_or(TransportError::NoAddress { address })?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(TransportError::Bind)?;
        debug!(%remote_addr, "UDP transport ready.");

        Ok(UdpTransport { socket, remote_addr })
    }

    /// Returns the resolved address datagrams are sent to.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(payload, self.remote_addr)?;
        trace!(bytes = sent, "Sent datagram.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use super::UdpTransport;
    use crate::transports::{Transport, TransportError};

    #[test]
    fn sends_one_datagram_per_payload() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut transport = UdpTransport::new("127.0.0.1", port).unwrap();
        assert_eq!(transport.remote_addr(), receiver.local_addr().unwrap());
        transport.send(b"first").unwrap();
        transport.send(b"second").unwrap();

        let mut buf = [0u8; 64];
        let len = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"first");
        let len = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"second");
    }

    #[test]
    fn unresolvable_host_fails_at_construction() {
        let result = UdpTransport::new("host.invalid", 8089);
        assert!(matches!(
            result,
            Err(TransportError::Resolve { .. }) | Err(TransportError::NoAddress { .. })
        ));
    }
}
