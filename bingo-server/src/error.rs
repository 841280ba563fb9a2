//! 错误类型定义

use protocol::{MessageKind, ProtocolError};
use thiserror::Error;

/// 房间错误类型
#[derive(Error, Debug)]
pub enum RoomError {
    /// 没有空座位
    #[error("Room is full ({capacity} slots)")]
    RoomFull { capacity: usize },

    /// 座位上没有玩家
    #[error("Slot {0} is empty")]
    EmptySlot(usize),

    /// 房间不处理此类请求
    #[error("Unhandled player request: {0}")]
    UnhandledRequest(MessageKind),

    /// 配置无效
    #[error("Invalid room config: {0}")]
    InvalidConfig(&'static str),
}

/// 单个连接的终止原因
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// 第一条消息不是 Hello
    #[error("First message on connection must be Hello, got {0}")]
    HandshakeExpected(MessageKind),
}
