use std::fmt;
use tokio::io::{self, AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Direction names one half of a relay for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ClientToRemote,
    RemoteToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToRemote => write!(f, "client -> remote"),
            Direction::RemoteToClient => write!(f, "remote -> client"),
        }
    }
}

/// relay copies bytes both ways between two streams until both directions
/// have reached end-of-stream or failed. Returns the byte counts as
/// (client -> remote, remote -> client)
///
/// Each direction runs in its own task and half-closes its destination when
/// its source is done, so the peer sees EOF while the other direction keeps
/// flowing. An error only ends the direction it happened in; the first error
/// is reported once both directions are finished.
pub async fn relay<C, R>(client: C, remote: R) -> io::Result<(u64, u64)>
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    R: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_rd, client_wr) = io::split(client);
    let (remote_rd, remote_wr) = io::split(remote);

    let upstream = tokio::spawn(copy_half(client_rd, remote_wr, Direction::ClientToRemote));
    let downstream = tokio::spawn(copy_half(remote_rd, client_wr, Direction::RemoteToClient));

    // Wait for both halves, never just the first one
    let (upstream, downstream) = tokio::join!(upstream, downstream);

    let from_client = upstream.map_err(io::Error::other)?;
    let from_server = downstream.map_err(io::Error::other)?;

    Ok((from_client?, from_server?))
}

/// copy_half drains reader into writer then shuts down the writer
async fn copy_half<Rd, Wr>(mut reader: Rd, mut writer: Wr, direction: Direction) -> io::Result<u64>
where
    Rd: AsyncRead + Unpin,
    Wr: AsyncWrite + Unpin,
{
    let copied = io::copy(&mut reader, &mut writer).await;

    // Half-close even after an error so the peer is not left hanging
    if let Err(e) = writer.shutdown().await {
        debug!("{direction}: shutdown failed: {e}");
    }

    match &copied {
        Ok(n) => debug!("{direction}: finished after {n} bytes"),
        Err(e) => debug!("{direction}: aborted: {e}"),
    }

    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, DuplexStream, ReadBuf, duplex};
    use tokio::time::timeout;

    /// Stream whose reads always fail while writes pass through
    struct FailingReads(DuplexStream);

    impl AsyncRead for FailingReads {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("read failed")))
        }
    }

    impl AsyncWrite for FailingReads {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().0).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().0).poll_shutdown(cx)
        }
    }

    #[tokio::test]
    async fn waits_for_both_directions_and_copies_exactly() {
        let (mut client_app, client_proxy) = duplex(4096);
        let (remote_proxy, mut remote_app) = duplex(4096);

        let handle = tokio::spawn(relay(client_proxy, remote_proxy));

        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        client_app.write_all(&payload).await.unwrap();
        client_app.shutdown().await.unwrap();

        let mut received = Vec::new();
        remote_app.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, payload);

        // Remote has not closed its side yet, so the relay must still be running
        let mut handle = handle;
        assert!(
            timeout(Duration::from_millis(100), &mut handle)
                .await
                .is_err()
        );

        remote_app.write_all(b"bye").await.unwrap();
        remote_app.shutdown().await.unwrap();

        let mut echoed = Vec::new();
        client_app.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"bye");

        let (from_client, from_server) = handle.await.unwrap().unwrap();
        assert_eq!(from_client, payload.len() as u64);
        assert_eq!(from_server, 3);
    }

    #[tokio::test]
    async fn remote_closing_first_still_lets_client_finish() {
        let (mut client_app, client_proxy) = duplex(4096);
        let (remote_proxy, mut remote_app) = duplex(4096);

        let handle = tokio::spawn(relay(client_proxy, remote_proxy));

        remote_app.write_all(b"banner").await.unwrap();
        remote_app.shutdown().await.unwrap();

        let mut banner = Vec::new();
        client_app.read_to_end(&mut banner).await.unwrap();
        assert_eq!(banner, b"banner");

        // Client can still talk after receiving EOF from the remote
        client_app.write_all(b"late").await.unwrap();
        client_app.shutdown().await.unwrap();

        let mut late = Vec::new();
        remote_app.read_to_end(&mut late).await.unwrap();
        assert_eq!(late, b"late");

        let (from_client, from_server) = handle.await.unwrap().unwrap();
        assert_eq!((from_client, from_server), (4, 6));
    }

    #[tokio::test]
    async fn read_error_ends_only_its_own_direction() {
        let (mut client_app, client_proxy) = duplex(4096);
        let (remote_proxy, mut remote_app) = duplex(4096);

        let mut handle = tokio::spawn(relay(FailingReads(client_proxy), remote_proxy));

        // The failed direction still half-closes the remote
        let mut received = Vec::new();
        remote_app.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());

        assert!(
            timeout(Duration::from_millis(100), &mut handle)
                .await
                .is_err()
        );

        remote_app.write_all(b"still flowing").await.unwrap();
        remote_app.shutdown().await.unwrap();

        let mut flowed = Vec::new();
        client_app.read_to_end(&mut flowed).await.unwrap();
        assert_eq!(flowed, b"still flowing");

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(err.to_string(), "read failed");
    }
}
