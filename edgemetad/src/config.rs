use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "edgemetad")]
#[command(about = "Edge-side metadata manager", long_about = None)]
pub struct Config {
    /// Bound on how long a remote cloud round-trip may take before the caller
    /// gets an error reply.
    #[arg(long, env = "EDGEMETA_REMOTE_QUERY_TIMEOUT_SECS", default_value_t = 10)]
    pub remote_query_timeout_secs: u64,

    /// Bound on how long a CSI volume operation forwarded to Edged may take.
    #[arg(long, env = "EDGEMETA_CSI_SYNC_TIMEOUT_SECS", default_value_t = 45)]
    pub csi_sync_timeout_secs: u64,

    /// Default tracing verbosity, overridden by RUST_LOG when set.
    #[arg(long, env = "EDGEMETA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn remote_query_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_query_timeout_secs)
    }

    pub fn csi_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.csi_sync_timeout_secs)
    }
}
