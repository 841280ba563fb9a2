//! 连接封装
//!
//! 将帧读写与读超时封装在一起，提供类型安全的消息收发接口。

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::codec::{FrameReader, FrameWriter};
use crate::error::{ProtocolError, Result};
use crate::message::Message;
use crate::transport::Transport;
use crate::{BODY_TIMEOUT, IDLE_TIMEOUT};

/// 读超时配置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadDeadlines {
    /// 等待下一个帧头的最长时间
    pub idle: Duration,
    /// 帧头到达后等待负载的最长时间
    pub body: Duration,
}

impl Default for ReadDeadlines {
    fn default() -> Self {
        Self {
            idle: IDLE_TIMEOUT,
            body: BODY_TIMEOUT,
        }
    }
}

/// 带超时的帧读取器
pub struct TimedReader<R> {
    reader: FrameReader<R>,
    deadlines: ReadDeadlines,
}

impl<R: AsyncRead + Unpin> TimedReader<R> {
    pub fn new(reader: R, deadlines: ReadDeadlines) -> Self {
        Self {
            reader: FrameReader::new(reader),
            deadlines,
        }
    }

    /// 接收一条消息，空闲超时和消息体超时分别计时
    pub async fn recv(&mut self) -> Result<Message> {
        let header = timeout(self.deadlines.idle, self.reader.read_header())
            .await
            .map_err(|_| ProtocolError::IdleTimeout)??;
        timeout(self.deadlines.body, self.reader.read_body(header))
            .await
            .map_err(|_| ProtocolError::BodyTimeout)?
    }
}

/// 连接封装
///
/// # Type Parameters
/// * `R` - 读取端类型
/// * `W` - 写入端类型
pub struct Connection<R, W> {
    reader: TimedReader<R>,
    writer: FrameWriter<W>,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Connection<R, W> {
    /// 从传输层创建连接
    pub fn new<T: Transport<Reader = R, Writer = W>>(
        transport: T,
        deadlines: ReadDeadlines,
    ) -> Self {
        let (reader, writer) = transport.split();
        Self::from_parts(reader, writer, deadlines)
    }

    /// 从读写端直接创建连接
    pub fn from_parts(reader: R, writer: W, deadlines: ReadDeadlines) -> Self {
        Self {
            reader: TimedReader::new(reader, deadlines),
            writer: FrameWriter::new(writer),
        }
    }

    /// 分离为读取端和写入端
    ///
    /// 服务端握手后把写入端交给房间，自己只保留读取端
    pub fn split(self) -> (TimedReader<R>, FrameWriter<W>) {
        (self.reader, self.writer)
    }

    /// 接收消息
    pub async fn recv(&mut self) -> Result<Message> {
        self.reader.recv().await
    }

    /// 发送消息
    pub async fn send(&mut self, msg: &Message) -> Result<()> {
        self.writer.write_message(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Hello, PlayerDisconnected};
    use crate::{TcpListener, TcpTransport, TransportConfig, TransportListener};
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn test_connection_send_recv() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_handle = tokio::spawn(async move {
            let config = TransportConfig::default();
            let transport = TcpTransport::connect(&addr.to_string(), &config)
                .await
                .unwrap();
            let mut conn = Connection::new(transport, ReadDeadlines::default());

            conn.send(&Message::Hello(Hello {
                name: "test".to_string(),
                preferred_color: 0,
            }))
            .await
            .unwrap();

            let msg = conn.recv().await.unwrap();
            assert_eq!(
                msg,
                Message::PlayerDisconnected(PlayerDisconnected { slot: 1 })
            );
        });

        let (transport, _peer) = listener.accept().await.unwrap();
        let mut conn = Connection::new(transport, ReadDeadlines::default());

        let msg = conn.recv().await.unwrap();
        assert!(matches!(msg, Message::Hello(_)));

        conn.send(&Message::PlayerDisconnected(PlayerDisconnected { slot: 1 }))
            .await
            .unwrap();

        client_handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let (_client, server) = duplex(64);
        let mut reader = TimedReader::new(server, ReadDeadlines::default());
        assert!(matches!(
            reader.recv().await,
            Err(ProtocolError::IdleTimeout)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_timeout() {
        let (mut client, server) = duplex(64);
        // 只发帧头，负载迟迟不来
        client.write_all(&[0, 1, 0, 8]).await.unwrap();

        let mut reader = TimedReader::new(server, ReadDeadlines::default());
        assert!(matches!(
            reader.recv().await,
            Err(ProtocolError::BodyTimeout)
        ));
    }
}
