use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:3001")]
    pub server_addr: String,

    /// Service name reported by the health endpoint.
    #[arg(long, env = "SERVICE_NAME", default_value = "PRAXIS Mini-ICEBURG Proxy")]
    pub service_name: String,

    // --- Generator Args ---
    /// Interpreter used to launch the generation script (e.g., python3)
    #[arg(long, env = "ICEBURG_INTERPRETER", default_value = "python3")]
    pub interpreter: String,

    /// Path to the Mini-ICEBURG generation script.
    #[arg(long, env = "ICEBURG_SCRIPT_PATH", default_value = "mini_iceburg.py")]
    pub script_path: String,

    /// Seconds to wait for the generation process before it is killed.
    #[arg(long, env = "GENERATION_TIMEOUT_SECS", default_value = "30",
          value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Model label returned alongside every generated response.
    #[arg(long, env = "MODEL_NAME", default_value = "Mini-ICEBURG")]
    pub model_name: String,

    // --- Admission Args ---
    /// Maximum number of generation processes running at once. 0 disables the cap.
    #[arg(long, env = "MAX_CONCURRENT_GENERATIONS", default_value = "32")]
    pub max_concurrent: usize,

    /// Global chat requests allowed per second. 0 disables rate limiting.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "0")]
    pub rate_limit_per_second: u32,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format) for serving HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for serving HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
