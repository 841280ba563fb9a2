//! 错误类型定义

use thiserror::Error;

use crate::message::MessageKind;

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 对端在帧边界处正常关闭连接
    #[error("Stream closed")]
    StreamClosed,

    /// 帧头读取不完整
    #[error("Truncated header: got {received} of 4 bytes")]
    TruncatedHeader { received: usize },

    /// 消息体读取不完整
    #[error("Truncated body: got {received} of {expected} bytes")]
    TruncatedBody { expected: usize, received: usize },

    /// 未知的消息类型
    #[error("Unknown message type {0}")]
    UnknownMessageType(u16),

    /// 负载无法按声明的类型解码
    #[error("Malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// 负载超出长度字段的表示范围
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// 空闲超时
    #[error("Idle timeout")]
    IdleTimeout,

    /// 消息体超时
    #[error("Body timeout")]
    BodyTimeout,

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// Hello 缺少名字
    #[error("Hello without name")]
    EmptyName,
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
