pub mod api;
pub mod shutdown;

use crate::cli::Args;
use crate::generator::Generator;
use self::api::{ router, AppState };
use self::shutdown::shutdown_signal;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum_server::tls_rustls::RustlsConfig;
use log::{ info, warn, error };

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct Server {
    addr: String,
    generator: Arc<dyn Generator>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, generator: Arc<dyn Generator>, args: Args) -> Self {
        if args.max_concurrent == 0 {
            warn!("Server configured WITHOUT a concurrency cap. Every request spawns a process.");
        }
        Self { addr, generator, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>().map_err(|e|
            format!("Invalid server address '{}': {}", self.addr, e)
        )?;
        let app = router(AppState::new(Arc::clone(&self.generator), &self.args));

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert_path), Some(key_path)) => (cert_path, key_path),
                (Some(_), None) | (None, Some(_)) => {
                    error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                    return Err("Missing TLS certificate or key path".into());
                }
                (None, None) => {
                    error!("--enable-tls was set but no certificate/key paths provided.");
                    return Err("TLS enabled without cert/key".into());
                }
            };
            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);

            // axum-server may pull in more than one rustls backend; pin ring.
            let _ = rustls::crypto::ring::default_provider().install_default();
            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path).await?;

            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            info!("HTTPS server listening on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service()).await?;
        } else {
            info!("TLS not enabled. Running plain HTTP server.");
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
                format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
            )?;
            info!("HTTP server listening on: http://{}", addr);
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal()).await?;
        }

        info!("Server stopped");
        Ok(())
    }
}
