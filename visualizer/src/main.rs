use anyhow::Context;
use clap::Parser;
use dashcore::export::DirectorySaver;
use dashcore::presentation::SharedSink;
use dashcore::protocol::{ExportFormat, MonitoringParameters, VisualizationMode};
use dashcore::transport::HttpTransport;
use dashcore::Controller;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;

mod config;
mod dashboard;
mod headless;
mod widgets;

#[derive(Parser)]
#[command(author, version, about = "Real-time monitoring dashboard")]
struct Args {
    /// Load client settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    export_dir: Option<PathBuf>,
    /// Give up on a command after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Run one session from the arguments below and log progress instead of opening a window
    #[arg(long, default_value_t = false)]
    headless: bool,
    #[arg(long)]
    target: Option<String>,
    #[arg(long, default_value = "")]
    operator: String,
    #[arg(long, default_value_t = 60)]
    duration: u64,
    #[arg(long, default_value_t = VisualizationMode::Map)]
    visualization: VisualizationMode,
    /// Export the results once a headless session ends
    #[arg(long)]
    export: Option<ExportFormat>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let client = config::resolve(
        args.config.as_deref(),
        config::Overrides {
            backend_url: args.backend_url.clone(),
            export_dir: args.export_dir.clone(),
            timeout_ms: args.timeout_ms,
        },
    )?;
    log::info!("backend at {}", client.backend_url);

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating controller runtime")?;

    if args.headless {
        let target = args
            .target
            .clone()
            .context("--target is required with --headless")?;
        let parameters =
            MonitoringParameters::new(target, args.operator.clone(), args.duration, args.visualization);
        return runtime.block_on(headless::run(&client, parameters, args.export));
    }

    let _guard = runtime.enter();
    let sink = Arc::new(SharedSink::new());
    let handle = Controller::spawn(
        Arc::new(HttpTransport::from_config(&client)),
        sink.clone(),
        Arc::new(DirectorySaver::new(&client.export_dir)),
        &client,
    );
    dashboard::run(handle, sink).map_err(|err| anyhow::anyhow!("running dashboard: {err}"))
}
