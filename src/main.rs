//! `coredump-recv` binary: run the receiver or replay a dump to one.

mod cli;

use std::{error::Error, time::Duration};

use clap::Parser;
use coredump_recv::{
    client::DumpSender,
    frame::{DeviceId, FirmwareVersion},
    server::DumpServer,
    sink::FsSink,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, SendArgs, ServeArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Send(args) => send(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    install_metrics_exporter(&args)?;

    let idle = (args.idle_timeout_secs > 0).then(|| Duration::from_secs(args.idle_timeout_secs));
    let mut server = DumpServer::new(FsSink::new(&args.output_dir))
        .idle_timeout(idle)
        .max_payload_len(args.max_payload_len)
        .max_connections(args.max_connections);
    if let Some(workers) = args.workers {
        server = server.workers(workers);
    }
    tracing::info!(output_dir = %args.output_dir.display(), "storing dumps");
    server.bind(args.bind)?.run().await?;
    Ok(())
}

async fn send(args: SendArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let device: DeviceId = args.device.parse()?;
    let version: FirmwareVersion = args.firmware_version.parse()?;
    let dump = tokio::fs::read(&args.file).await?;

    let report = DumpSender::new(device, version)
        .chunk_size(args.chunk_size)
        .send_to(args.addr.as_str(), &dump)
        .await?;
    println!(
        "sent {} bytes in {} frames from {}",
        report.payload_bytes,
        report.frames,
        args.file.display()
    );
    Ok(())
}

#[cfg(feature = "metrics")]
fn install_metrics_exporter(args: &ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    if let Some(addr) = args.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        tracing::info!(%addr, "serving metrics");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics_exporter(args: &ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    if args.metrics_addr.is_some() {
        tracing::warn!("built without the metrics feature; ignoring --metrics-addr");
    }
    Ok(())
}
