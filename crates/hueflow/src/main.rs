use anyhow::{Context, Result};
use clap::Parser;
use hueflow::{logging_setup, signals, Cli, Orchestrator};
use hueflow_control::{BatchExecutor, HttpBatchExecutor, NullExecutor};
use hueflow_core::HueflowConfig;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = HueflowConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;
    cli.apply(&mut config);

    // Nothing is spawned before the configuration is known to be valid.
    let clusters = config.validate().context("Invalid configuration")?;

    let _log_guard = logging_setup::init(&config.logging)?;

    info!("==========================================");
    info!("===      Hueflow Session Started       ===");
    info!("==========================================");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("hueflow-io")
        .build()
        .context("Failed to start async runtime")?;

    let executor: Arc<dyn BatchExecutor> = if cli.lights_enabled() {
        Arc::new(HttpBatchExecutor::new(&config.network, runtime.handle().clone())?)
    } else {
        info!("Lights disabled, nothing will be sent.");
        Arc::new(NullExecutor)
    };

    let orchestrator = Orchestrator::new(config, clusters, executor)?;
    let ctx = orchestrator.context();
    signals::install(
        runtime.handle(),
        Arc::clone(&ctx.stop),
        Arc::clone(&ctx.results),
    );

    let throughput = orchestrator.run()?;

    // Abandoned batches are dropped with the runtime.
    runtime.shutdown_background();

    println!("Results:");
    println!("{}", throughput);
    Ok(())
}
