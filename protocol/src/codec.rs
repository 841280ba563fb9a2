//! 帧编解码
//!
//! 帧格式:
//! ```text
//! ┌────────────┬────────────┬────────────────────────────────┐
//! │  Type (2B) │  Size (2B) │         Payload (JSON)         │
//! │   u16 BE   │   u16 BE   │     exactly `size` bytes       │
//! └────────────┴────────────┴────────────────────────────────┘
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};
use crate::message::{Message, MessageKind};
use crate::{HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// 帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// 消息类型标签（未校验）
    pub kind: u16,
    /// 负载字节数
    pub size: u16,
}

impl Header {
    /// 从线上字节解析
    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            kind: u16::from_be_bytes([bytes[0], bytes[1]]),
            size: u16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }

    /// 编码为线上字节
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.kind.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.size.to_be_bytes());
        bytes
    }
}

/// 尽量填满 `buf`，返回实际读到的字节数（遇到 EOF 时可能小于 `buf.len()`）
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// 帧读取器
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// 创建新的帧读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }

    /// 读取帧头
    ///
    /// 在帧边界上正常 EOF 返回 `StreamClosed`，读到一半返回 `TruncatedHeader`。
    pub async fn read_header(&mut self) -> Result<Header> {
        let mut bytes = [0u8; HEADER_SIZE];
        let received = read_full(&mut self.reader, &mut bytes).await?;
        match received {
            0 => Err(ProtocolError::StreamClosed),
            HEADER_SIZE => Ok(Header::from_bytes(bytes)),
            received => Err(ProtocolError::TruncatedHeader { received }),
        }
    }

    /// 按帧头读取并解码消息体
    ///
    /// 负载总是被完整读出后才检查类型标签，保证流停在下一帧的边界上。
    pub async fn read_body(&mut self, header: Header) -> Result<Message> {
        let expected = header.size as usize;

        // 仅在需要时扩容
        if self.buffer.len() < expected {
            self.buffer.resize(expected, 0);
        }
        let received = read_full(&mut self.reader, &mut self.buffer[..expected]).await?;
        if received < expected {
            return Err(ProtocolError::TruncatedBody { expected, received });
        }

        let kind = MessageKind::try_from(header.kind)?;
        Message::decode(kind, &self.buffer[..expected])
    }

    /// 读取一帧完整消息
    pub async fn read_message(&mut self) -> Result<Message> {
        let header = self.read_header().await?;
        self.read_body(header).await
    }

    /// 接收消息（read_message 的别名）
    pub async fn recv(&mut self) -> Result<Message> {
        self.read_message().await
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// 创建新的帧写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 编码并写入一帧消息
    ///
    /// 帧头和负载拼成一个缓冲区一次写出。写失败不重试。
    pub async fn write_message(&mut self, msg: &Message) -> Result<()> {
        let frame = encode_frame(msg)?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// 将消息编码为完整的帧（帧头 + 负载）
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>> {
    let payload = msg.encode_payload()?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let header = Header {
        kind: msg.kind().tag(),
        size: payload.len() as u16,
    };
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Board, Hello, PlayerDisconnected, PlayerLocation};
    use std::io::Cursor;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let mut buffer = Vec::new();

        {
            let mut writer = FrameWriter::new(&mut buffer);
            let msg = Message::Hello(Hello {
                name: "test_user".to_string(),
                preferred_color: 2,
            });
            writer.write_message(&msg).await.unwrap();
        }

        {
            let mut reader = FrameReader::new(Cursor::new(&buffer));
            let msg = reader.read_message().await.unwrap();
            assert_eq!(
                msg,
                Message::Hello(Hello {
                    name: "test_user".to_string(),
                    preferred_color: 2,
                })
            );
        }
    }

    #[tokio::test]
    async fn test_wire_bytes() {
        let mut buffer = Vec::new();
        let mut writer = FrameWriter::new(&mut buffer);
        writer
            .write_message(&Message::PlayerDisconnected(PlayerDisconnected { slot: 4 }))
            .await
            .unwrap();

        let payload = br#"{"p":4}"#;
        assert_eq!(&buffer[..4], &[0, 3, 0, payload.len() as u8]);
        assert_eq!(&buffer[4..], payload);
    }

    #[tokio::test]
    async fn test_multiple_messages_in_sequence() {
        let messages = vec![
            Message::Board(Board {
                seed: 42,
                config: "cfg".to_string(),
            }),
            Message::PlayerLocation(PlayerLocation {
                slot: 1,
                location: -3,
            }),
            Message::PlayerDisconnected(PlayerDisconnected { slot: 1 }),
        ];

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            for msg in &messages {
                writer.write_message(msg).await.unwrap();
            }
        }

        let mut reader = FrameReader::new(Cursor::new(&buffer));
        for expected in &messages {
            assert_eq!(&reader.read_message().await.unwrap(), expected);
        }
        assert!(matches!(
            reader.read_message().await,
            Err(ProtocolError::StreamClosed)
        ));
    }

    #[tokio::test]
    async fn test_empty_stream_is_closed() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read_header().await,
            Err(ProtocolError::StreamClosed)
        ));
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let mut reader = FrameReader::new(Cursor::new(vec![0u8, 1, 0]));
        assert!(matches!(
            reader.read_header().await,
            Err(ProtocolError::TruncatedHeader { received: 3 })
        ));
    }

    #[tokio::test]
    async fn test_truncated_body() {
        // 声明 10 字节，只给 4 字节
        let mut bytes = vec![0u8, 4, 0, 10];
        bytes.extend_from_slice(b"{\"s\"");
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_message().await,
            Err(ProtocolError::TruncatedBody {
                expected: 10,
                received: 4
            })
        ));
    }

    #[tokio::test]
    async fn test_unknown_message_type() {
        let mut bytes = vec![0u8, 9, 0, 2];
        bytes.extend_from_slice(b"{}");
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_message().await,
            Err(ProtocolError::UnknownMessageType(9))
        ));
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let mut bytes = vec![0u8, 5, 0, 3];
        bytes.extend_from_slice(b"[1]");
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_message().await,
            Err(ProtocolError::MalformedPayload {
                kind: MessageKind::PlayerLocation,
                ..
            })
        ));
    }

    #[test]
    fn test_payload_too_large() {
        let msg = Message::Board(Board {
            seed: 0,
            config: "x".repeat(MAX_PAYLOAD_SIZE),
        });
        assert!(matches!(
            encode_frame(&msg),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_header_bytes() {
        let header = Header {
            kind: 0x0102,
            size: 0x0304,
        };
        assert_eq!(header.to_bytes(), [1, 2, 3, 4]);
        assert_eq!(Header::from_bytes([1, 2, 3, 4]), header);
    }
}
