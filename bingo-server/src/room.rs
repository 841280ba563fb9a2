//! 房间：权威的共享状态
//!
//! 座位、颜色与棋盘都由一把互斥锁保护。加入、离开、请求处理（连同其中的
//! 广播写出）各自在一个临界区内完成，因此所有客户端看到的事件顺序一致。
//! 代价是广播期间持锁，一个写得慢的连接会拖住整个房间。

use protocol::{
    Board, FrameWriter, Message, PlayerCompletion, PlayerConnected, PlayerDisconnected,
    PlayerLocation,
};
use rand::Rng;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RoomConfig;
use crate::error::RoomError;

/// 连接标识，由连接驱动分配，房间据此找到离开的玩家
pub type ConnectionId = u64;

/// 座位上的玩家
struct PlayerInfo<W> {
    conn: ConnectionId,
    writer: FrameWriter<W>,
    name: String,
    color: u32,
    location: i16,
    completion: u32,
}

/// 玩家状态的只读副本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub name: String,
    pub color: u32,
    pub location: i16,
    pub completion: u32,
}

struct RoomState<W> {
    board: Board,
    palette: Vec<u32>,
    num_players: usize,
    players: Vec<Option<PlayerInfo<W>>>,
}

/// 房间
pub struct Room<W> {
    state: Mutex<RoomState<W>>,
}

impl<W: AsyncWrite + Unpin + Send> Room<W> {
    pub fn new(config: RoomConfig) -> Result<Self, RoomError> {
        config.validate()?;
        let players = (0..config.max_players).map(|_| None).collect();
        Ok(Self {
            state: Mutex::new(RoomState {
                board: Board::default(),
                palette: config.palette,
                num_players: 0,
                players,
            }),
        })
    }

    /// 玩家入座，返回分配到的座位号
    ///
    /// 依次：向所有人（含新玩家）广播 `PlayerConnected`，向新玩家发送当前棋盘，
    /// 再按座位顺序发送其余每位玩家的 `PlayerConnected`、`PlayerLocation`、
    /// `PlayerCompletion`。房间已满时不做任何改动。
    pub async fn join(
        &self,
        conn: ConnectionId,
        writer: FrameWriter<W>,
        name: String,
        preferred_color: i64,
    ) -> Result<usize, RoomError> {
        let mut state = self.state.lock().await;

        let slot = state.find_empty_slot().ok_or(RoomError::RoomFull {
            capacity: state.players.len(),
        })?;
        let color = state.find_unused_color(preferred_color);

        state.players[slot] = Some(PlayerInfo {
            conn,
            writer,
            name: name.clone(),
            color,
            location: 0,
            completion: 0,
        });
        state.num_players += 1;
        info!(slot, color = %format!("#{:06x}", color), "Player connected");

        // 空房间迎来第一位玩家时清空棋盘，避免上一局的棋盘残留
        if state.num_players == 1 {
            state.board = Board::default();
        }

        state
            .broadcast(&Message::PlayerConnected(PlayerConnected {
                slot: wire_slot(slot),
                name,
                color,
            }))
            .await;

        if let Err(e) = state.send_snapshot(slot).await {
            warn!(slot, "Failed to send room snapshot: {}", e);
        }

        Ok(slot)
    }

    /// 玩家离座；连接未入座或已离开时什么也不做。返回腾出的座位号
    pub async fn leave(&self, conn: ConnectionId) -> Option<usize> {
        let mut state = self.state.lock().await;

        let slot = state
            .players
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.conn == conn))?;

        state.players[slot] = None;
        state.num_players -= 1;
        info!(slot, "Player disconnected");

        state
            .broadcast(&Message::PlayerDisconnected(PlayerDisconnected {
                slot: wire_slot(slot),
            }))
            .await;
        Some(slot)
    }

    /// 处理已入座玩家的请求
    pub async fn handle_request(&self, slot: usize, msg: Message) -> Result<(), RoomError> {
        let kind = msg.kind();
        match msg {
            // 握手时已处理，重复的 Hello 直接忽略
            Message::Hello(_) => Ok(()),
            Message::Board(req) => {
                self.generate_new_board(req.config).await;
                Ok(())
            }
            Message::PlayerCompletion(req) => {
                self.set_player_completion(slot, req.completion).await
            }
            Message::PlayerLocation(req) => self.set_player_location(slot, req.location).await,
            Message::PlayerConnected(_) | Message::PlayerDisconnected(_) => {
                Err(RoomError::UnhandledRequest(kind))
            }
        }
    }

    /// 生成新棋盘并广播；种子总由服务端决定
    async fn generate_new_board(&self, config: String) {
        let mut state = self.state.lock().await;

        let seed = rand::rng().random_range(0..=i32::MAX);
        state.board = Board { seed, config };
        info!(seed, config = %state.board.config, "Generated new board");

        let board = Message::Board(state.board.clone());
        state.broadcast(&board).await;
    }

    async fn set_player_completion(&self, slot: usize, completion: u32) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;

        let player = state.player_mut(slot)?;
        debug!(completion, "Update completion");
        player.completion = completion;

        state
            .broadcast(&Message::PlayerCompletion(PlayerCompletion {
                slot: wire_slot(slot),
                completion,
            }))
            .await;
        Ok(())
    }

    async fn set_player_location(&self, slot: usize, location: i16) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;

        let player = state.player_mut(slot)?;
        debug!(location, "Update location");
        player.location = location;

        state
            .broadcast(&Message::PlayerLocation(PlayerLocation {
                slot: wire_slot(slot),
                location,
            }))
            .await;
        Ok(())
    }

    /// 当前在座人数
    pub async fn occupancy(&self) -> usize {
        self.state.lock().await.num_players
    }

    /// 座位总数
    pub async fn capacity(&self) -> usize {
        self.state.lock().await.players.len()
    }

    /// 当前棋盘
    pub async fn board(&self) -> Board {
        self.state.lock().await.board.clone()
    }

    /// 指定座位上的玩家
    pub async fn player(&self, slot: usize) -> Option<PlayerSnapshot> {
        let state = self.state.lock().await;
        state.players.get(slot)?.as_ref().map(|p| PlayerSnapshot {
            name: p.name.clone(),
            color: p.color,
            location: p.location,
            completion: p.completion,
        })
    }
}

impl<W: AsyncWrite + Unpin + Send> RoomState<W> {
    fn find_empty_slot(&self) -> Option<usize> {
        self.players.iter().position(Option::is_none)
    }

    /// 颜色分配：偏好颜色未被占用则采用，否则取调色板中第一个未占用的，
    /// 全部占用时退回第一个颜色
    fn find_unused_color(&self, preferred: i64) -> u32 {
        if let Some(&color) = usize::try_from(preferred)
            .ok()
            .and_then(|i| self.palette.get(i))
        {
            if self.is_color_unused(color) {
                return color;
            }
        }
        self.palette
            .iter()
            .copied()
            .find(|&color| self.is_color_unused(color))
            .unwrap_or(self.palette[0])
    }

    fn is_color_unused(&self, color: u32) -> bool {
        !self.players.iter().flatten().any(|p| p.color == color)
    }

    fn player_mut(&mut self, slot: usize) -> Result<&mut PlayerInfo<W>, RoomError> {
        self.players
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or(RoomError::EmptySlot(slot))
    }

    /// 按座位顺序逐个发送；某个连接写失败只记录日志，不影响其他人
    async fn broadcast(&mut self, msg: &Message) {
        for (slot, player) in self.players.iter_mut().enumerate() {
            let Some(player) = player else {
                continue;
            };
            if let Err(e) = player.writer.write_message(msg).await {
                warn!(slot, "Failed to send {} to player: {}", msg.kind(), e);
            }
        }
    }

    /// 向新玩家发送当前棋盘和其余所有玩家的状态
    async fn send_snapshot(&mut self, slot: usize) -> protocol::Result<()> {
        let mut messages = vec![Message::Board(self.board.clone())];
        for (i, p) in self.players.iter().enumerate() {
            let Some(p) = p else {
                continue;
            };
            if i == slot {
                continue;
            }
            messages.push(Message::PlayerConnected(PlayerConnected {
                slot: wire_slot(i),
                name: p.name.clone(),
                color: p.color,
            }));
            messages.push(Message::PlayerLocation(PlayerLocation {
                slot: wire_slot(i),
                location: p.location,
            }));
            messages.push(Message::PlayerCompletion(PlayerCompletion {
                slot: wire_slot(i),
                completion: p.completion,
            }));
        }

        if let Some(player) = self.players[slot].as_mut() {
            for msg in &messages {
                player.writer.write_message(msg).await?;
            }
        }
        Ok(())
    }
}

/// 座位号的线上表示；座位号小于座位数，不会溢出
fn wire_slot(slot: usize) -> i64 {
    slot as i64
}
