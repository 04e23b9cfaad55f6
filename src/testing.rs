//! In-memory client helpers for unit tests

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{
    duplex, AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf, ReadHalf, WriteHalf,
};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::config::SessionConfig;
use crate::session::{Session, SessionReader};

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Client end of an in-memory connection
pub(crate) struct TestPeer {
    lines: FramedRead<ReadHalf<DuplexStream>, LinesCodec>,
    writer: WriteHalf<DuplexStream>,
}

impl TestPeer {
    pub(crate) async fn send_line(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Like `send_line`, but reports a closed connection instead of panicking
    pub(crate) async fn try_send_line(&mut self, line: &str) -> bool {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .is_ok()
    }

    pub(crate) async fn next_line(&mut self) -> String {
        timeout(READ_TIMEOUT, self.lines.next())
            .await
            .expect("timed out waiting for a line")
            .expect("stream ended")
            .expect("invalid line")
    }

    /// Assert no line arrives for a short while
    pub(crate) async fn expect_silence(&mut self) {
        if let Ok(Some(line)) = timeout(QUIET_PERIOD, self.lines.next()).await {
            panic!("unexpected line: {:?}", line);
        }
    }
}

/// Open a session over an in-memory stream whose client already sent `username`
pub(crate) async fn open_session(
    username: &str,
    config: &SessionConfig,
) -> (Arc<Session>, SessionReader<ReadHalf<DuplexStream>>, TestPeer) {
    let (server, client) = duplex(64 * 1024);
    let (client_read, mut client_write) = tokio::io::split(client);
    client_write
        .write_all(format!("{}\n", username).as_bytes())
        .await
        .unwrap();

    let (session, reader) = Session::open(server, format!("test:{}", username), config)
        .await
        .unwrap();

    let peer = TestPeer {
        lines: FramedRead::new(client_read, LinesCodec::new()),
        writer: client_write,
    };
    (session, reader, peer)
}

/// Server end whose reads work but whose every write fails
pub(crate) struct FailingWrites {
    inner: DuplexStream,
}

impl AsyncRead for FailingWrites {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for FailingWrites {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Open a session whose socket writes fail while its read side stays open
///
/// The returned client stream must be kept alive to keep the read side open.
pub(crate) async fn open_session_with_failing_writes(
    username: &str,
    config: &SessionConfig,
) -> (Arc<Session>, SessionReader<ReadHalf<FailingWrites>>, DuplexStream) {
    let (server, mut client) = duplex(64 * 1024);
    client
        .write_all(format!("{}\n", username).as_bytes())
        .await
        .unwrap();

    let (session, reader) = Session::open(
        FailingWrites { inner: server },
        format!("test:{}", username),
        config,
    )
    .await
    .unwrap();
    (session, reader, client)
}
