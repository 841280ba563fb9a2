//! 字节流通道
//!
//! 帧编解码只需要一对有序、可靠的读写端。`Transport` 描述如何拿到这一对端，
//! `TransportListener` 描述服务端如何接入新的通道；目前只有 TCP 一种实现。

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::{ProtocolError, Result};
use crate::CONNECT_TIMEOUT;

/// 拨号参数
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// 关闭 Nagle，位置更新这类小包立即发出
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            nodelay: true,
        }
    }
}

/// 一条已建立的双向字节流
pub trait Transport: Send + Sync + Sized {
    type Reader: AsyncRead + Unpin + Send;
    type Writer: AsyncWrite + Unpin + Send;

    /// 主动连接 `addr`（"host:port"），超过 `config.connect_timeout` 报
    /// [`ProtocolError::ConnectionTimeout`]
    fn connect(addr: &str, config: &TransportConfig) -> impl Future<Output = Result<Self>> + Send;

    /// 拆成互不借用的读端和写端，可分别交给不同任务
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// 被动接入新通道的一方
pub trait TransportListener: Send + Sync + Sized {
    type Transport: Transport;

    fn bind(addr: &str) -> impl Future<Output = Result<Self>> + Send;

    /// 等待下一个接入者，连同其地址一起返回
    fn accept(&self) -> impl Future<Output = Result<(Self::Transport, SocketAddr)>> + Send;
}

/// TCP 上的字节流
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    fn wrap(stream: TcpStream, nodelay: bool) -> Result<Self> {
        stream.set_nodelay(nodelay)?;
        let peer = stream.peer_addr()?;
        Ok(Self { stream, peer })
    }

    /// 连接另一端的地址
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn connect(addr: &str, config: &TransportConfig) -> Result<Self> {
        let dial = TcpStream::connect(addr);
        let stream = match tokio::time::timeout(config.connect_timeout, dial).await {
            Ok(stream) => stream?,
            Err(_) => return Err(ProtocolError::ConnectionTimeout),
        };
        let transport = Self::wrap(stream, config.nodelay)?;
        debug!(peer = %transport.peer, "Dialed server");
        Ok(transport)
    }

    fn split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}

/// TCP 监听端；接入的连接一律关闭 Nagle
pub struct TcpListener {
    inner: tokio::net::TcpListener,
}

impl TcpListener {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl TransportListener for TcpListener {
    type Transport = TcpTransport;

    async fn bind(addr: &str) -> Result<Self> {
        let inner = tokio::net::TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    async fn accept(&self) -> Result<(TcpTransport, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        trace!(%peer, "Accepted TCP stream");
        Ok((TcpTransport::wrap(stream, true)?, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_bind_picks_ephemeral_port() {
        let (listener, _) = loopback().await;
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_both_ends_agree_on_addresses() {
        let (listener, addr) = loopback().await;

        let dialing = tokio::spawn(async move {
            TcpTransport::connect(&addr, &TransportConfig::default()).await
        });
        let (accepted, peer) = listener.accept().await.unwrap();
        let dialed = dialing.await.unwrap().unwrap();

        assert_eq!(accepted.peer_addr(), peer);
        assert_eq!(dialed.peer_addr(), listener.local_addr().unwrap());
        assert!(accepted.stream.nodelay().unwrap());
        assert!(dialed.stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_split_halves_carry_bytes() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (listener, addr) = loopback().await;
        let dialing = tokio::spawn(async move {
            TcpTransport::connect(&addr, &TransportConfig::default()).await
        });
        let (accepted, _) = listener.accept().await.unwrap();
        let (_, mut tx) = dialing.await.unwrap().unwrap().split();
        let (mut rx, _) = accepted.split();

        tx.write_all(b"bingo").await.unwrap();
        let mut buf = [0u8; 5];
        rx.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"bingo");
    }

    #[tokio::test]
    async fn test_connect_without_listener_fails() {
        // 端口释放后不再有人监听
        let addr = loopback().await.1;
        let result = TcpTransport::connect(&addr, &TransportConfig::default()).await;
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }
}
