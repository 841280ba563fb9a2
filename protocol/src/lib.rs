//! 宾果房间共享协议库
//!
//! 包含:
//! - 消息类型定义 (Message, MessageKind 及各负载结构)
//! - 帧编解码 (FrameReader, FrameWriter)
//! - 连接封装与读超时 (Connection, TimedReader)
//! - 传输层抽象 (Transport trait)

mod codec;
mod connection;
mod constants;
mod error;
mod message;
mod transport;

pub use codec::{encode_frame, FrameReader, FrameWriter, Header};
pub use connection::{Connection, ReadDeadlines, TimedReader};
pub use constants::*;
pub use error::{ProtocolError, Result};
pub use message::{
    Board, Hello, Message, MessageKind, PlayerCompletion, PlayerConnected, PlayerDisconnected,
    PlayerLocation,
};
pub use transport::{TcpListener, TcpTransport, Transport, TransportConfig, TransportListener};
