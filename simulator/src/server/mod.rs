pub mod routes;
pub mod state;

use anyhow::Context;
use log::info;
use std::future::Future;
use std::net::SocketAddr;

pub use routes::routes;
pub use state::Simulator;

/// Serves the backend on `addr` until `shutdown` resolves.
pub async fn serve(
    sim: Simulator,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let (bound, server) = warp::serve(routes(sim))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .with_context(|| format!("binding simulator to {addr}"))?;
    info!("simulator listening on http://{}", bound);
    server.await;
    info!("simulator stopped");
    Ok(())
}
