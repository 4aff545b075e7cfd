//! The physical-link collaborator contract
//!
//! The crate never talks to a radio itself. Whatever owns the hardware
//! provides a [`Transport`]: `listen` blocks until a peer dials in,
//! `connect` dials out, and both yield an ordered, reliable byte stream
//! that stays up until one end closes it. Dropping the stream is the
//! cancellation primitive; there is nothing else to interrupt.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::sync::{Mutex, mpsc};

/// One endpoint of a point-to-point link
pub trait Transport: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Advertise availability and block until a peer connects
    fn listen(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;

    /// Dial the peer at `address` and block until the link is up
    fn connect(&self, address: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

const MEM_STREAM_CAPACITY: usize = 64 * 1024;

/// In-process loopback endpoint, one half of a [`mem_pair`]. Used by the
/// test suite and handy for demos: connecting hands the opposite endpoint
/// a fresh duplex stream to accept.
pub struct MemTransport {
    accept_rx: Mutex<mpsc::UnboundedReceiver<DuplexStream>>,
    peer_tx: mpsc::UnboundedSender<DuplexStream>,
}

/// Two loopback endpoints wired to each other
pub fn mem_pair() -> (MemTransport, MemTransport) {
    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();
    (
        MemTransport {
            accept_rx: Mutex::new(rx_a),
            peer_tx: tx_b,
        },
        MemTransport {
            accept_rx: Mutex::new(rx_b),
            peer_tx: tx_a,
        },
    )
}

impl Transport for MemTransport {
    type Stream = DuplexStream;

    fn listen(&self) -> impl Future<Output = io::Result<DuplexStream>> + Send {
        async move {
            self.accept_rx.lock().await.recv().await.ok_or_else(|| {
                io::Error::new(io::ErrorKind::BrokenPipe, "peer endpoint dropped")
            })
        }
    }

    fn connect(&self, _address: &str) -> impl Future<Output = io::Result<DuplexStream>> + Send {
        async move {
            let (local, remote) = tokio::io::duplex(MEM_STREAM_CAPACITY);
            self.peer_tx.send(remote).map_err(|_| {
                io::Error::new(io::ErrorKind::ConnectionRefused, "peer endpoint dropped")
            })?;
            Ok(local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_connect_then_accept_moves_bytes_both_ways() {
        let (a, b) = mem_pair();
        let mut dialed = b.connect("a").await.expect("loopback connect");
        let mut accepted = a.listen().await.expect("loopback accept");

        dialed.write_all(b"ping").await.expect("write");
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).await.expect("read");
        assert_eq!(&buf, b"ping");

        accepted.write_all(b"pong").await.expect("write back");
        dialed.read_exact(&mut buf).await.expect("read back");
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_listen_fails_once_peer_endpoint_dropped() {
        let (a, b) = mem_pair();
        drop(b);
        assert!(a.listen().await.is_err());
    }

    #[tokio::test]
    async fn test_read_sees_eof_after_peer_drops_stream() {
        let (a, b) = mem_pair();
        let dialed = b.connect("a").await.expect("connect");
        let mut accepted = a.listen().await.expect("accept");
        drop(dialed);
        let mut buf = [0u8; 8];
        assert_eq!(accepted.read(&mut buf).await.expect("eof read"), 0);
    }
}
