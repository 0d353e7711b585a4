use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use pipeline_publisher::{
    serve_metrics, Config, ControlEvent, ControlSender, GStreamerPipelineFactory, MetricsReporter,
    NoopReporter, PrometheusReporter, PublisherService, WebRtcTrackFactory, WhipConnector,
};

fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    // Initialize logging
    let filter = if config.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Initialize GStreamer (infrastructure concern)
    gstreamer::init()?;

    // The publisher blocks on this runtime from its own thread, so it is
    // built by hand instead of taking over `main`
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("publisher-rt")
        .build()?;

    let metrics: Arc<dyn MetricsReporter> = match config.metrics_port {
        Some(port) => {
            PrometheusReporter::init_metrics()?;
            runtime.spawn(serve_metrics(port));
            Arc::new(PrometheusReporter::new())
        }
        None => Arc::new(NoopReporter),
    };

    let publisher_config = config
        .to_publisher_config()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("Starting pipeline publisher");
    info!("  Endpoint: {}", publisher_config.endpoint());
    info!("  Pipeline: {}", publisher_config.pipeline_description());
    if let Some(port) = config.metrics_port {
        info!("  Metrics port: {}", port);
    }

    if config.delay > 0 {
        info!("Waiting {}s before starting", config.delay);
        std::thread::sleep(Duration::from_secs(config.delay));
    }

    // Create infrastructure implementations (dependency injection)
    let tracks = WebRtcTrackFactory::new(runtime.handle().clone());
    let pipeline_factory = GStreamerPipelineFactory::new(tracks, Arc::clone(&metrics));
    let connector = WhipConnector::new(runtime.handle().clone(), config.ice_servers.clone())
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut publisher = PublisherService::new(publisher_config, pipeline_factory, connector, metrics);
    runtime.spawn(forward_signals(publisher.control_sender()));

    let result = publisher.run();

    runtime.shutdown_timeout(Duration::from_secs(1));

    if let Err(e) = result {
        error!("Publisher failed: {}", e);
        return Err(anyhow::anyhow!("{}", e));
    }

    info!("Publisher shutdown complete");
    Ok(())
}

/// Turns SIGINT, SIGTERM and SIGQUIT into stop requests
#[cfg(unix)]
async fn forward_signals(events: ControlSender) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut quit) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(terminate), Ok(quit)) => (terminate, quit),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to install signal handlers: {}", e);
            return;
        }
    };

    loop {
        let name = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for ctrl+c: {}", e);
                    return;
                }
                "SIGINT"
            }
            _ = terminate.recv() => "SIGTERM",
            _ = quit.recv() => "SIGQUIT",
        };
        events.send(ControlEvent::Signal(name.to_string()));
    }
}

#[cfg(not(unix))]
async fn forward_signals(events: ControlSender) {
    while tokio::signal::ctrl_c().await.is_ok() {
        events.send(ControlEvent::Signal("SIGINT".to_string()));
    }
}
