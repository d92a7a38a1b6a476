use anyhow::{anyhow, Context};
use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use warp::Filter;

use photo_share::config::Config;
use photo_share::db;
use photo_share::routes::build_routes;
use photo_share::warp_helpers::{cors, handle_rejection};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    info!("Starting photo-share server on {}", addr);
    info!("Database: {}", config.db_path);

    if !is_port_available(addr) {
        error!(
            "Port {} is already in use. Stop the other instance or set PHOTO_SHARE_PORT.",
            config.port
        );
        return Err(anyhow!("Port {} is already in use", config.port));
    }

    let db_pool = db::create_db_pool(&config.db_path, config.max_connections)
        .await
        .map_err(|e| anyhow!("Failed to open database {}: {}", config.db_path, e))?;
    info!("Database initialized successfully");

    let routes = build_routes(db_pool)
        .with(cors())
        .with(warp::log("photo_share"))
        .recover(handle_rejection);

    info!("Server started successfully, listening on http://{}", addr);

    warp::serve(routes).run(addr).await;

    Ok(())
}

fn is_port_available(addr: SocketAddr) -> bool {
    TcpListener::bind(addr).is_ok()
}
