//! 房间与服务器配置

use anyhow::{bail, Context};
use protocol::{ReadDeadlines, DEFAULT_MAX_PLAYERS};

use crate::error::RoomError;

/// 将 RGB 分量打包为 0x00RRGGBB
pub const fn rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

pub const RED: u32 = rgb(255, 0, 0);
pub const BLUE: u32 = rgb(0, 0, 255);
pub const GREEN: u32 = rgb(0, 255, 0);
pub const PURPLE: u32 = rgb(96, 0, 160);
pub const ORANGE: u32 = rgb(255, 127, 0);
pub const PINK: u32 = rgb(255, 0, 255);
pub const TEAL: u32 = rgb(0, 160, 160);
pub const YELLOW: u32 = rgb(255, 255, 0);

/// 默认调色板，按分配优先级排列
pub const DEFAULT_PALETTE: [u32; 8] = [RED, BLUE, GREEN, PURPLE, ORANGE, PINK, TEAL, YELLOW];

/// 房间配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomConfig {
    /// 座位数，房间生命周期内不变
    pub max_players: usize,
    /// 候选颜色
    pub palette: Vec<u32>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl RoomConfig {
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.max_players == 0 {
            return Err(RoomError::InvalidConfig("max_players must be at least 1"));
        }
        if self.palette.is_empty() {
            return Err(RoomError::InvalidConfig("palette must not be empty"));
        }
        Ok(())
    }
}

/// 服务器配置
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// 监听地址，格式为 "host:port"
    pub addr: String,
    pub room: RoomConfig,
    pub read_deadlines: ReadDeadlines,
}

impl ServerConfig {
    /// 在所有网卡的指定端口上监听，其余取默认值
    pub fn from_port(port: u16) -> Self {
        Self {
            addr: format!("0.0.0.0:{}", port),
            room: RoomConfig::default(),
            read_deadlines: ReadDeadlines::default(),
        }
    }
}

/// 命令行用法
pub const USAGE: &str = "usage: bingo-server <port>";

/// 解析监听端口参数；缺失或为 0 时报错
pub fn parse_port(arg: Option<&str>) -> anyhow::Result<u16> {
    let Some(arg) = arg else {
        bail!("missing port argument\n{}", USAGE);
    };
    let port: u16 = arg
        .parse()
        .with_context(|| format!("invalid port {:?}\n{}", arg, USAGE))?;
    if port == 0 {
        bail!("port must be non-zero\n{}", USAGE);
    }
    Ok(port)
}
