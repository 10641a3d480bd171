use anyhow::Context;
use clap::Parser;
use scenario::ScenarioScript;
use server::Simulator;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;

mod runner;
mod scenario;
mod server;

#[derive(Parser)]
#[command(author, version, about = "Reference monitoring backend for the dashboard")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:5000")]
    bind: SocketAddr,
    /// Replay a scenario from YAML instead of the built-in linear one
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Milliseconds between progress events of the built-in scenario
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
    /// Number of steps of the built-in scenario
    #[arg(long, default_value_t = 20)]
    steps: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let script = if let Some(path) = args.scenario {
        ScenarioScript::load(path)?
    } else {
        ScenarioScript::linear(args.steps, args.tick_ms)
    };
    log::info!(
        "replaying {} steps every {}ms (Ctrl+C to stop)",
        script.steps.len(),
        script.tick_ms
    );

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating simulator runtime")?;
    runtime.block_on(async move {
        let shutdown = async {
            if let Err(err) = signal::ctrl_c().await {
                log::error!("awaiting Ctrl+C: {}", err);
            }
        };
        server::serve(Simulator::new(script), args.bind, shutdown).await
    })
}
