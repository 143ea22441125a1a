pub mod cli;
pub mod error;
pub mod generator;
pub mod models;
pub mod server;

use cli::Args;
use log::{ info, warn };
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Service Name: {}", args.service_name);
    info!("Interpreter: {}", args.interpreter);
    info!("Script Path: {}", args.script_path);
    info!("Generation Timeout: {}s", args.timeout_secs);
    info!("Model Name: {}", args.model_name);
    if args.max_concurrent > 0 {
        info!("Max Concurrent Generations: {}", args.max_concurrent);
    } else {
        info!("Max Concurrent Generations: unlimited");
    }
    if args.rate_limit_per_second > 0 {
        info!("Rate Limit: {} req/s", args.rate_limit_per_second);
    } else {
        info!("Rate Limit: disabled");
    }
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    if !std::path::Path::new(&args.script_path).exists() {
        warn!(
            "Script '{}' does not exist yet; chat requests will fail until it does.",
            args.script_path
        );
    }

    let generator = generator::new_generator(&args);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, generator, args);
    server.run().await?;

    Ok(())
}
