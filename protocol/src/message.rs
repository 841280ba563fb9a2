//! 消息类型定义
//!
//! 每种消息对应一个负载结构体，JSON 字段名是协议的一部分，
//! 必须与现有客户端逐字节一致。解码沿用现有客户端所依赖的宽松规则：
//! 缺失字段取零值，未知字段忽略，字段名不区分大小写，
//! 座位号与颜色下标按 64 位有符号整数接收。

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// 消息类型标签（帧头中的 type 字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageKind {
    Hello = 1,
    PlayerConnected = 2,
    PlayerDisconnected = 3,
    Board = 4,
    PlayerLocation = 5,
    PlayerCompletion = 6,
}

impl MessageKind {
    /// 线上标签值
    pub fn tag(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for MessageKind {
    type Error = ProtocolError;

    fn try_from(tag: u16) -> Result<Self> {
        match tag {
            1 => Ok(Self::Hello),
            2 => Ok(Self::PlayerConnected),
            3 => Ok(Self::PlayerDisconnected),
            4 => Ok(Self::Board),
            5 => Ok(Self::PlayerLocation),
            6 => Ok(Self::PlayerCompletion),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hello => "Hello",
            Self::PlayerConnected => "PlayerConnected",
            Self::PlayerDisconnected => "PlayerDisconnected",
            Self::Board => "Board",
            Self::PlayerLocation => "PlayerLocation",
            Self::PlayerCompletion => "PlayerCompletion",
        };
        f.write_str(name)
    }
}

/// 握手消息（仅客户端 → 服务端，连接上的第一条消息）
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Hello {
    pub name: String,
    /// 偏好的调色板下标，越界时由服务端另行分配
    #[serde(rename = "color")]
    pub preferred_color: i64,
}

impl Hello {
    /// 校验握手内容
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ProtocolError::EmptyName);
        }
        Ok(())
    }
}

/// 玩家加入通知
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PlayerConnected {
    #[serde(rename = "p")]
    pub slot: i64,
    pub name: String,
    /// 0x00RRGGBB
    pub color: u32,
}

/// 玩家离开通知
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PlayerDisconnected {
    #[serde(rename = "p")]
    pub slot: i64,
}

/// 棋盘：客户端发送时表示请求新棋盘（种子被忽略），服务端发送时为当前棋盘
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Board {
    #[serde(rename = "s")]
    pub seed: i32,
    #[serde(rename = "cfg")]
    pub config: String,
}

/// 玩家位置
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PlayerLocation {
    #[serde(rename = "p")]
    pub slot: i64,
    #[serde(rename = "loc")]
    pub location: i16,
}

/// 玩家完成进度（位掩码）
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PlayerCompletion {
    #[serde(rename = "p")]
    pub slot: i64,
    #[serde(rename = "com")]
    pub completion: u32,
}

/// 线上传输的全部消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(Hello),
    PlayerConnected(PlayerConnected),
    PlayerDisconnected(PlayerDisconnected),
    Board(Board),
    PlayerLocation(PlayerLocation),
    PlayerCompletion(PlayerCompletion),
}

impl Message {
    /// 消息对应的类型标签
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Hello(_) => MessageKind::Hello,
            Message::PlayerConnected(_) => MessageKind::PlayerConnected,
            Message::PlayerDisconnected(_) => MessageKind::PlayerDisconnected,
            Message::Board(_) => MessageKind::Board,
            Message::PlayerLocation(_) => MessageKind::PlayerLocation,
            Message::PlayerCompletion(_) => MessageKind::PlayerCompletion,
        }
    }

    /// 序列化负载（不含帧头）
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        let encoded = match self {
            Message::Hello(m) => serde_json::to_vec(m),
            Message::PlayerConnected(m) => serde_json::to_vec(m),
            Message::PlayerDisconnected(m) => serde_json::to_vec(m),
            Message::Board(m) => serde_json::to_vec(m),
            Message::PlayerLocation(m) => serde_json::to_vec(m),
            Message::PlayerCompletion(m) => serde_json::to_vec(m),
        };
        encoded.map_err(ProtocolError::Serialization)
    }

    /// 按类型标签解码负载
    pub fn decode(kind: MessageKind, payload: &[u8]) -> Result<Self> {
        let decoded = match kind {
            MessageKind::Hello => decode_payload(payload).map(Message::Hello),
            MessageKind::PlayerConnected => decode_payload(payload).map(Message::PlayerConnected),
            MessageKind::PlayerDisconnected => {
                decode_payload(payload).map(Message::PlayerDisconnected)
            }
            MessageKind::Board => decode_payload(payload).map(Message::Board),
            MessageKind::PlayerLocation => decode_payload(payload).map(Message::PlayerLocation),
            MessageKind::PlayerCompletion => {
                decode_payload(payload).map(Message::PlayerCompletion)
            }
        };
        decoded.map_err(|source| ProtocolError::MalformedPayload { kind, source })
    }
}

/// 解码负载；顶层字段名先统一转为小写（所有线上字段名都是小写）
fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> serde_json::Result<T> {
    let value = match serde_json::from_slice(payload)? {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect(),
        ),
        other => other,
    };
    serde_json::from_value(value)
}

impl From<Hello> for Message {
    fn from(m: Hello) -> Self {
        Message::Hello(m)
    }
}

impl From<PlayerConnected> for Message {
    fn from(m: PlayerConnected) -> Self {
        Message::PlayerConnected(m)
    }
}

impl From<PlayerDisconnected> for Message {
    fn from(m: PlayerDisconnected) -> Self {
        Message::PlayerDisconnected(m)
    }
}

impl From<Board> for Message {
    fn from(m: Board) -> Self {
        Message::Board(m)
    }
}

impl From<PlayerLocation> for Message {
    fn from(m: PlayerLocation) -> Self {
        Message::PlayerLocation(m)
    }
}

impl From<PlayerCompletion> for Message {
    fn from(m: PlayerCompletion) -> Self {
        Message::PlayerCompletion(m)
    }
}
