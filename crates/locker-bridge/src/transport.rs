//! Byte-stream transports the locker can reach the bridge over.

use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use bridge_config_and_utils::TransportConfig;
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// A connected, bidirectional byte stream to the locker.
pub trait Link: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Link for T {}

pub type BoxedLink = Box<dyn Link>;

/// Source of locker connections.
#[async_trait]
pub trait Transport: Send {
    /// Try to obtain a connection.
    ///
    /// `Ok(None)` means the transport is not available yet and the caller
    /// should poll again later.
    async fn open(&mut self) -> BridgeResult<Option<BoxedLink>>;

    /// Human readable endpoint, for logs.
    fn describe(&self) -> String;
}

/// A character device such as `/dev/rfcomm0`.
///
/// The node only exists while the Bluetooth serial link is bound, so a
/// missing node is normal and simply polled for.
pub struct DeviceTransport {
    path: PathBuf,
    reported_missing: bool,
}

impl DeviceTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reported_missing: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for DeviceTransport {
    async fn open(&mut self) -> BridgeResult<Option<BoxedLink>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            if !self.reported_missing {
                info!(device = %self.path.display(), "Device not present, waiting for it");
                self.reported_missing = true;
            } else {
                debug!(device = %self.path.display(), "Device still not present");
            }
            return Ok(None);
        }

        let link = DeviceLink::open(&self.path)?;

        self.reported_missing = false;
        info!(device = %self.path.display(), "Device opened");
        Ok(Some(Box::new(link)))
    }

    fn describe(&self) -> String {
        format!("device {}", self.path.display())
    }
}

/// Non-blocking handle on a character device or FIFO.
///
/// Reads wait on the reactor rather than a blocking-pool thread, so
/// dropping the link while the locker is silent releases it at once.
pub struct DeviceLink {
    fd: AsyncFd<File>,
}

impl DeviceLink {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(path)?;
        // Regular files are rejected here by epoll with EPERM
        Ok(Self {
            fd: AsyncFd::new(file)?,
        })
    }
}

impl AsyncRead for DeviceLink {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.read(unfilled)
            }) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for DeviceLink {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.write(buf)
            }) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    // Writes go straight to the descriptor.
    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// TCP listener serving one locker connection at a time.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: &str) -> BridgeResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Listening for locker connections");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> BridgeResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    /// Waits for the next client.
    async fn open(&mut self) -> BridgeResult<Option<BoxedLink>> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        info!(peer = %peer, "Locker connected");
        Ok(Some(Box::new(stream)))
    }

    fn describe(&self) -> String {
        match self.listener.local_addr() {
            Ok(addr) => format!("tcp {}", addr),
            Err(_) => "tcp".to_string(),
        }
    }
}

/// Build the transport selected in the configuration.
pub async fn from_config(config: &TransportConfig) -> BridgeResult<Box<dyn Transport>> {
    match config {
        TransportConfig::Device { path } => Ok(Box::new(DeviceTransport::new(path.clone()))),
        TransportConfig::Tcp { bind } => {
            if bind.trim().is_empty() {
                return Err(BridgeError::Config("tcp transport needs a bind address".to_string()));
            }
            Ok(Box::new(TcpTransport::bind(bind).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::harness::make_fifo;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_missing_device_is_not_available() {
        let dir = TempDir::new().unwrap();
        let mut transport = DeviceTransport::new(dir.path().join("rfcomm0"));

        assert!(transport.open().await.unwrap().is_none());
        assert!(transport.open().await.unwrap().is_none());
        assert!(transport.describe().contains("rfcomm0"));
    }

    #[tokio::test]
    async fn test_device_opens_once_present() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rfcomm0");
        let mut transport = DeviceTransport::new(&path);
        assert!(transport.open().await.unwrap().is_none());

        make_fifo(&path);
        let mut link = transport.open().await.unwrap().expect("device should open");

        // The bridge holds the FIFO open for reading, so this does not block
        let mut locker = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        locker.write_all(b"BORROW,12345678\n").unwrap();

        let mut buf = [0u8; 16];
        link.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"BORROW,12345678\n");
    }

    #[tokio::test]
    async fn test_regular_file_is_not_a_device() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rfcomm0");
        std::fs::write(&path, b"").unwrap();

        let mut transport = DeviceTransport::new(&path);
        assert!(matches!(
            transport.open().await,
            Err(BridgeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_tcp_accepts_client() {
        let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"hello\n").await.unwrap();
            let mut reply = [0u8; 3];
            stream.read_exact(&mut reply).await.unwrap();
            reply
        });

        let mut link = transport.open().await.unwrap().unwrap();
        let mut buf = [0u8; 6];
        link.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello\n");
        link.write_all(b"OK\n").await.unwrap();
        link.flush().await.unwrap();

        assert_eq!(&client.await.unwrap(), b"OK\n");
    }

    #[tokio::test]
    async fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let device = from_config(&TransportConfig::Device {
            path: dir.path().join("rfcomm9"),
        })
        .await
        .unwrap();
        assert!(device.describe().starts_with("device"));

        let tcp = from_config(&TransportConfig::Tcp {
            bind: "127.0.0.1:0".to_string(),
        })
        .await
        .unwrap();
        assert!(tcp.describe().starts_with("tcp 127.0.0.1:"));

        assert!(matches!(
            from_config(&TransportConfig::Tcp {
                bind: " ".to_string()
            })
            .await,
            Err(BridgeError::Config(_))
        ));
    }
}
