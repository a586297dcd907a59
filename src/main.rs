use sheetedit::app;
use sheetedit::config::{ServerConfig, parse_addr};
use std::env;

/// Start the workbook editing server.
///
/// Configuration comes from the environment (see `ServerConfig`); a single positional
/// argument overrides the listen address, e.g. `sheetedit 0.0.0.0:8080`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = args.get(1) {
        config.addr = parse_addr(addr)?;
    }

    log::info!(
        "upload ttl: {}, max upload: {} bytes, max cells per sheet: {}",
        config
            .ttl
            .map(|ttl| format!("{}s", ttl.as_secs()))
            .unwrap_or_else(|| "none".to_string()),
        config.max_upload_bytes,
        config.max_cells
    );
    app::run(config).await
}
