//! 协议常量定义

use std::time::Duration;

/// 帧头大小: 2 字节类型 + 2 字节长度
pub const HEADER_SIZE: usize = 4;

/// 单帧负载最大长度（长度字段为 u16）
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// 房间默认座位数
pub const DEFAULT_MAX_PLAYERS: usize = 8;

/// 空闲超时（秒）- 每次读取帧头前重置
pub const IDLE_TIMEOUT_SECS: u64 = 30;

/// 消息体超时（秒）- 读到帧头后，负载必须在此时间内到达
pub const BODY_TIMEOUT_SECS: u64 = 5;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 空闲超时 Duration
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(IDLE_TIMEOUT_SECS);

/// 消息体超时 Duration
pub const BODY_TIMEOUT: Duration = Duration::from_secs(BODY_TIMEOUT_SECS);

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
