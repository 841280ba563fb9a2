//! 宾果房间服务器
//!
//! 一个房间、固定数量的座位：客户端上报的棋盘、位置与完成进度
//! 由房间统一记录并转发给所有在座玩家。

pub mod config;
pub mod error;
pub mod room;
pub mod server;

pub use config::{RoomConfig, ServerConfig};
pub use error::{ConnectionError, RoomError};
pub use room::{ConnectionId, PlayerSnapshot, Room};
pub use server::{BingoServer, TcpRoom};
