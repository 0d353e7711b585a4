use clap::Parser;

use crate::domain::value_objects::PublisherConfig;
use crate::infrastructure::webrtc::DEFAULT_ICE_SERVER;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pipeline-publisher",
    version = "0.1.0",
    author = "Hawkeye Video Pipeline",
    about = "Publishes the encoded outputs of a GStreamer pipeline to a WebRTC session",
    after_help = "Example:\n  pipeline-publisher --token <token> -- \\\n    videotestsrc ! x264enc tune=zerolatency ! video/x-h264,profile=baseline \\\n    audiotestsrc ! opusenc"
)]
pub struct Config {
    /// WHIP endpoint to publish to
    #[arg(long, env = "PUBLISH_URL", default_value = "http://localhost:8080/whip")]
    pub url: String,

    /// Access token with publish permission
    #[arg(long, env = "PUBLISH_TOKEN")]
    pub token: String,

    /// Seconds to wait before starting
    #[arg(long, default_value = "0")]
    pub delay: u64,

    /// Serve Prometheus metrics and health probes on this port
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// ICE servers used for every peer connection
    #[arg(
        long = "ice-server",
        env = "ICE_SERVERS",
        value_delimiter = ',',
        default_value = DEFAULT_ICE_SERVER
    )]
    pub ice_servers: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// gst-launch style pipeline, e.g. `videotestsrc ! vp8enc`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub pipeline: Vec<String>,
}

/// Minimum allowed port (ports below 1024 are privileged)
const MIN_USER_PORT: u16 = 1024;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            anyhow::bail!("Publish URL must start with http:// or https://");
        }

        if self.token.trim().is_empty() {
            anyhow::bail!("Token cannot be empty");
        }

        if self.pipeline_description().trim().is_empty() {
            anyhow::bail!("A pipeline description is required, e.g. -- videotestsrc ! vp8enc");
        }

        if let Some(port) = self.metrics_port {
            Self::validate_port(port, "metrics")?;
        }

        Ok(())
    }

    fn validate_port(port: u16, name: &str) -> anyhow::Result<()> {
        if port == 0 {
            anyhow::bail!("Invalid {} port: port cannot be 0", name);
        }
        if port < MIN_USER_PORT {
            anyhow::bail!(
                "Invalid {} port: {} is a privileged port (< {}). Use a port >= {}",
                name,
                port,
                MIN_USER_PORT,
                MIN_USER_PORT
            );
        }
        Ok(())
    }

    pub fn pipeline_description(&self) -> String {
        self.pipeline.join(" ")
    }

    pub fn to_publisher_config(&self) -> crate::domain::errors::Result<PublisherConfig> {
        PublisherConfig::from_launch_args(&self.pipeline, self.url.clone(), self.token.clone())
    }
}
