//! UDP probe transport.
//!
//! One [`ProbeTransport`] backs exactly one logical exchange — a discovery
//! scan, a single heartbeat, or a single command. Replies to an exchange can
//! only arrive on that exchange's socket, so heartbeat, discovery and
//! command paths can never consume each other's datagrams.
//!
//! Receives race a native timer via `tokio::time::timeout`; there is no
//! availability polling anywhere.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::LinkResult;

/// Largest payload any peripheral is known to send. Device replies are short
/// ASCII tokens; anything longer is not ours.
const MAX_DATAGRAM: usize = 512;

/// A short-lived UDP socket for one request/reply exchange.
#[derive(Debug)]
pub struct ProbeTransport {
    socket: UdpSocket,
}

impl ProbeTransport {
    /// Bind an ephemeral dual-purpose socket with broadcast enabled.
    pub async fn bind() -> LinkResult<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.set_broadcast(true)?;
        Ok(Self { socket })
    }

    /// Send one datagram to `target`.
    ///
    /// An unanswered probe is a normal discovery outcome, so most callers
    /// ignore the result; command dispatch propagates it.
    pub async fn send_to(&self, payload: &[u8], target: SocketAddr) -> LinkResult<()> {
        self.socket.send_to(payload, target).await?;
        Ok(())
    }

    /// Send the same payload to every target, issuing all sends together
    /// rather than awaiting them one by one. Individual send failures are
    /// traced and dropped — datagram loss is expected on a broadcast scan.
    pub async fn broadcast_to<I>(&self, payload: &[u8], targets: I)
    where
        I: IntoIterator<Item = SocketAddr>,
    {
        let sends = targets
            .into_iter()
            .map(|target| self.socket.send_to(payload, target));
        for outcome in futures::future::join_all(sends).await {
            if let Err(e) = outcome {
                trace!(error = %e, "broadcast send dropped");
            }
        }
    }

    /// Wait for at most one datagram within `wait`.
    ///
    /// Returns `Ok(None)` on timeout — for probes, silence is an answer.
    pub async fn recv_with_timeout(
        &self,
        wait: Duration,
    ) -> LinkResult<Option<(Vec<u8>, SocketAddr)>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match tokio::time::timeout(wait, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                buf.truncate(len);
                Ok(Some((buf, from)))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => Ok(None),
        }
    }

    /// Send `payload` to `target` and await a single reply within `wait`,
    /// returning it as a trimmed string. `Ok(None)` on timeout.
    pub async fn exchange(
        &self,
        payload: &[u8],
        target: SocketAddr,
        wait: Duration,
    ) -> LinkResult<Option<(String, SocketAddr)>> {
        self.send_to(payload, target).await?;
        Ok(self
            .recv_with_timeout(wait)
            .await?
            .map(|(bytes, from)| (trim_payload(&bytes), from)))
    }

    /// Local address of the underlying socket.
    pub fn local_addr(&self) -> LinkResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

/// Decode a device payload as a whitespace-trimmed string. Devices speak
/// plain ASCII; anything undecodable will simply never match a signature.
pub fn trim_payload(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recv_times_out_quietly() {
        let transport = ProbeTransport::bind().await.unwrap();
        let got = transport
            .recv_with_timeout(Duration::from_millis(50))
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn exchange_round_trips_on_loopback() {
        let peer = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, from) = peer.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], b"PING");
            peer.send_to(b"  PONG\n", from).await.unwrap();
        });

        let transport = ProbeTransport::bind().await.unwrap();
        let (reply, from) = transport
            .exchange(b"PING", peer_addr, Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, "PONG");
        assert_eq!(from, peer_addr);
    }

    #[test]
    fn payload_trimming_strips_whitespace_only() {
        assert_eq!(trim_payload(b" 123985\r\n"), "123985");
        assert_eq!(trim_payload(b"OK"), "OK");
    }
}
