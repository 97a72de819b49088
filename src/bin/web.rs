#![cfg(not(tarpaulin_include))]

use ims_forms::ImsConfig;
use ims_forms::app;

/// Main entry point for the HTTP API
///
/// Reads the configuration named by `IMS_CONFIG` (default `ims.json`, or the
/// built-in defaults when absent) and serves the JSON API on `bind`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ImsConfig::load_or_default(ImsConfig::default_path())?;
    app::run(config).await
}
