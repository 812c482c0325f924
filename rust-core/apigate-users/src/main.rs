//! Users API server
//!
//! ```text
//! apigate-users [config.json]
//! ```

use anyhow::Context;
use apigate_core::{init_logging, GatewayConfig, Server};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = GatewayConfig::load(path.as_deref()).context("failed to load configuration")?;
    init_logging(&config.log).context("failed to initialize logging")?;

    let router = apigate_users::build_router(config.dispatch_config())
        .context("failed to build users router")?;
    info!(
        version = apigate_core::VERSION,
        routes = router.table().len(),
        "Starting users API"
    );

    Server::new(router, config.server_config())
        .serve()
        .await
        .context("server failed")?;

    info!("Server stopped");
    Ok(())
}
