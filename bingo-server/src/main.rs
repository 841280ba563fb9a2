//! 宾果房间服务端
//!
//! 基于 Tokio 的异步 TCP 服务器

use anyhow::Result;
use bingo_server::config::{parse_port, ServerConfig};
use bingo_server::BingoServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("bingo_server=debug".parse()?)
                .add_directive("protocol=debug".parse()?),
        )
        .init();

    let port = parse_port(std::env::args().nth(1).as_deref())?;

    info!("Bingo Server starting on port {}", port);

    let server = BingoServer::new(ServerConfig::from_port(port))?;
    server.run().await?;

    Ok(())
}
