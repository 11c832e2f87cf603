//! TCP connection to GPSD
//!
//! A [`Connection`] is split into a [`LineReader`], owned by whoever reads
//! records (the session before `start`, the read loop after), and a
//! [`CommandWriter`] shared between the read loop and the session handle.
//! The writer is swapped in place when the read loop reconnects.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use crate::{
    Result,
    error::GpsdError,
    protocol::{
        GpsdJsonDecodeAsync, GpsdJsonEncodeAsync,
        v3::{self, Report, ReportClass},
    },
};

type ReadStream = futures_util::io::BufReader<Compat<OwnedReadHalf>>;
type WriteStream = Compat<OwnedWriteHalf>;

/// A freshly dialed connection whose banner has been consumed
#[derive(Debug)]
pub(crate) struct Connection {
    reader: LineReader,
    writer: WriteStream,
}

impl Connection {
    /// Dials `address` within `timeout` and consumes the banner line
    ///
    /// The banner is normally a VERSION record; its content is only logged.
    /// A peer that closes before sending any banner is a protocol error.
    pub(crate) async fn open(address: &str, timeout: Duration) -> Result<Self> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(GpsdError::ConnectFailed {
                    address: address.into(),
                    source,
                });
            }
            Err(_elapsed) => {
                return Err(GpsdError::ConnectFailed {
                    address: address.into(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("no connection after {timeout:?}"),
                    ),
                });
            }
        };

        let (read_half, write_half) = stream.into_split();
        let mut reader = LineReader::new(read_half);
        match reader.next_line().await? {
            Some(banner) => inspect_banner(address, banner),
            None => {
                return Err(GpsdError::ProtocolError(
                    "Connection closed by GPSD before banner",
                ));
            }
        }

        Ok(Connection {
            reader,
            writer: write_half.compat_write(),
        })
    }

    pub(crate) fn into_split(self) -> (LineReader, WriteStream) {
        (self.reader, self.writer)
    }
}

fn inspect_banner(address: &str, banner: &[u8]) {
    let version = match v3::classify(banner) {
        Ok(Some(ReportClass::Version)) => Report::decode(ReportClass::Version, banner),
        _ => {
            debug!(address, "ignoring non-VERSION banner");
            return;
        }
    };

    if let Ok(Report::Version(version)) = version {
        debug!(
            address,
            release = %version.release,
            proto_major = version.proto_major,
            proto_minor = version.proto_minor,
            "connected to gpsd"
        );
        if version.proto_major != v3::API_VERSION_MAJOR {
            warn!(
                address,
                proto_major = version.proto_major,
                expected = v3::API_VERSION_MAJOR,
                "gpsd speaks an unexpected protocol major version"
            );
        }
    }
}

/// Buffered reader yielding one raw record per call
#[derive(Debug)]
pub(crate) struct LineReader {
    inner: ReadStream,
    buf: Vec<u8>,
}

impl LineReader {
    fn new(read_half: OwnedReadHalf) -> Self {
        LineReader {
            inner: futures_util::io::BufReader::new(read_half.compat()),
            buf: Vec::new(),
        }
    }

    /// Reads the next record, newline included; `None` at end of stream
    pub(crate) async fn next_line(&mut self) -> Result<Option<&[u8]>> {
        if self.inner.read_record(&mut self.buf).await? {
            Ok(Some(&self.buf))
        } else {
            Ok(None)
        }
    }
}

/// Write side of the current connection, shared and replaceable
#[derive(Debug, Clone)]
pub(crate) struct CommandWriter {
    inner: Arc<tokio::sync::Mutex<WriteStream>>,
}

impl CommandWriter {
    pub(crate) fn new(writer: WriteStream) -> Self {
        CommandWriter {
            inner: Arc::new(tokio::sync::Mutex::new(writer)),
        }
    }

    /// Writes one command to GPSD
    pub(crate) async fn send(&self, request: &v3::RequestMessage) -> Result<()> {
        self.inner.lock().await.write_request(request).await
    }

    /// Writes one command, logging instead of returning a failure
    pub(crate) async fn send_best_effort(&self, request: &v3::RequestMessage) {
        if let Err(e) = self.send(request).await {
            debug!(error = %e, ?request, "failed to send command to gpsd");
        }
    }

    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, WriteStream> {
        self.inner.lock().await
    }

    /// Points subsequent commands at a new connection
    pub(crate) async fn replace(&self, writer: WriteStream) {
        *self.inner.lock().await = writer;
    }

    /// Shuts down the write side of the current socket
    pub(crate) async fn shutdown(&self) {
        use futures_util::AsyncWriteExt;

        if let Err(e) = self.inner.lock().await.close().await {
            debug!(error = %e, "failed to shut down gpsd socket");
        }
    }
}

/// Errors that only mean "this socket is already gone"
pub(crate) fn is_closed_socket(err: &GpsdError) -> bool {
    matches!(
        err,
        GpsdError::IoError(e) if matches!(
            e.kind(),
            std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::UnexpectedEof
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    const BANNER: &str = "{\"class\":\"VERSION\",\"release\":\"3.25\",\"rev\":\"3.25\",\"proto_major\":3,\"proto_minor\":15}\n";

    #[tokio::test]
    async fn test_open_consumes_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(BANNER.as_bytes()).await.unwrap();
            socket
                .write_all(b"{\"class\":\"TPV\",\"mode\":3}\n")
                .await
                .unwrap();
            socket
        });

        let conn = Connection::open(&address, Duration::from_secs(2))
            .await
            .unwrap();
        let (mut reader, _writer) = conn.into_split();
        let line = reader.next_line().await.unwrap().unwrap();
        assert_eq!(line, b"{\"class\":\"TPV\",\"mode\":3}\n");

        drop(server.await.unwrap());
        assert!(reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_accepts_non_json_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"GPSD,R=1\n").await.unwrap();
            socket
        });

        assert!(
            Connection::open(&address, Duration::from_secs(2))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_open_without_banner_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let err = Connection::open(&address, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, GpsdError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn test_open_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = Connection::open(&address, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, GpsdError::ConnectFailed { .. }));
    }

    #[test]
    fn test_closed_socket_classification() {
        let closed = GpsdError::IoError(std::io::ErrorKind::NotConnected.into());
        let reset = GpsdError::IoError(std::io::ErrorKind::ConnectionReset.into());
        assert!(is_closed_socket(&closed));
        assert!(!is_closed_socket(&reset));
        assert!(!is_closed_socket(&GpsdError::ProtocolError("other")));
    }
}
