//! 房间服务器：监听循环与单连接驱动

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use protocol::{
    Connection, Message, ProtocolError, ReadDeadlines, TcpListener, TcpTransport,
    TransportListener,
};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::watch;
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

use crate::config::ServerConfig;
use crate::error::{ConnectionError, RoomError};
use crate::room::{ConnectionId, Room};

/// 服务端使用的房间类型：每个玩家的写入端是 TCP 连接的写半边
pub type TcpRoom = Room<OwnedWriteHalf>;

/// 关闭时等待连接退出的最长时间
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// 房间服务器
pub struct BingoServer {
    config: ServerConfig,
    room: Arc<TcpRoom>,
    /// 下一个连接 ID
    next_conn_id: AtomicU64,
    /// 当前连接数
    active: Arc<AtomicUsize>,
    /// 关闭信号发送端
    shutdown_tx: watch::Sender<bool>,
    /// 关闭信号接收端（用于克隆给连接处理器）
    shutdown_rx: watch::Receiver<bool>,
}

impl BingoServer {
    pub fn new(config: ServerConfig) -> Result<Self, RoomError> {
        let room = Arc::new(Room::new(config.room.clone())?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            room,
            next_conn_id: AtomicU64::new(1),
            active: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// 服务器持有的房间
    pub fn room(&self) -> &Arc<TcpRoom> {
        &self.room
    }

    /// 当前连接数
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 绑定配置中的地址并运行，直到收到 Ctrl+C
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// 在已绑定的监听器上接受连接，`shutdown` 完成后优雅关闭
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((transport, peer)) => self.spawn_connection(transport, peer),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }

                _ = &mut shutdown => {
                    info!("Received shutdown signal, initiating graceful shutdown...");
                    self.shutdown().await;
                    break;
                }
            }
        }

        Ok(())
    }

    fn spawn_connection(&self, transport: TcpTransport, peer: SocketAddr) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        let room = Arc::clone(&self.room);
        let active = Arc::clone(&self.active);
        let deadlines = self.config.read_deadlines;
        let shutdown_rx = self.shutdown_rx.clone();

        let span = info_span!(
            "conn",
            id = conn_id,
            client = %peer,
            name = field::Empty,
            slot = field::Empty
        );

        active.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(
            async move {
                debug!("Accepted connection");
                let result =
                    handle_connection(conn_id, transport, &room, deadlines, shutdown_rx).await;
                room.leave(conn_id).await;

                match result {
                    Ok(()) | Err(ConnectionError::Protocol(ProtocolError::StreamClosed)) => {
                        info!("Connection closed");
                    }
                    Err(e) => error!("Connection error: {}", e),
                }
                active.fetch_sub(1, Ordering::SeqCst);
            }
            .instrument(span),
        );
    }

    /// 通知所有连接退出，最多等待 5 秒
    async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let start = Instant::now();
        while self.active_connections() > 0 {
            if start.elapsed() > SHUTDOWN_GRACE {
                warn!(
                    "Shutdown timeout, {} connections still active",
                    self.active_connections()
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        info!("Server shutdown complete");
    }
}

/// 处理单个连接：握手、入座，然后把后续消息转交给房间
///
/// 返回后由调用方负责离座。
async fn handle_connection(
    conn_id: ConnectionId,
    transport: TcpTransport,
    room: &TcpRoom,
    deadlines: ReadDeadlines,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ConnectionError> {
    if *shutdown_rx.borrow_and_update() {
        return Ok(());
    }

    let mut conn = Connection::new(transport, deadlines);

    // 握手阶段同样响应关闭信号，沉默的客户端不能拖住关闭
    let first = tokio::select! {
        result = conn.recv() => result?,

        _ = shutdown_rx.changed() => {
            info!("Shutdown signal received before handshake");
            return Ok(());
        }
    };
    let hello = match first {
        Message::Hello(hello) => hello,
        other => return Err(ConnectionError::HandshakeExpected(other.kind())),
    };
    hello.validate()?;
    Span::current().record("name", hello.name.as_str());

    let (mut reader, writer) = conn.split();
    let slot = room
        .join(conn_id, writer, hello.name, hello.preferred_color)
        .await?;
    Span::current().record("slot", slot);

    loop {
        tokio::select! {
            result = reader.recv() => {
                room.handle_request(slot, result?).await?;
            }

            _ = shutdown_rx.changed() => {
                info!("Shutdown signal received");
                return Ok(());
            }
        }
    }
}
