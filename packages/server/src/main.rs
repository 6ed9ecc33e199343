#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the flow map pipeline.
//!
//! Reads its configuration from the environment:
//!
//! - `FLOWMAP_CONFIG`: TOML or `property,value` CSV config file
//! - `FLOWMAP_LOCATIONS` / `FLOWMAP_FLOWS`: datasets loaded at startup
//! - `FLOWMAP_FORMAT`: `csv` (default) or `gsheets`
//! - `BIND_ADDR` / `PORT`: listen address

use std::path::Path;

use flowmap_flow_models::DataFormat;
use flowmap_server::{ServerOptions, run_server};
use flowmap_server_models::LoadRequest;
use flowmap_state::{Config, default_viewport, initial_state};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = match std::env::var("FLOWMAP_CONFIG") {
        Ok(path) => Config::load(Path::new(&path))?,
        Err(_) => Config::default(),
    };
    let format: DataFormat = match std::env::var("FLOWMAP_FORMAT") {
        Ok(format) => format.parse()?,
        Err(_) => DataFormat::Csv,
    };
    let source = |var: &str| {
        std::env::var(var)
            .ok()
            .map(|url| LoadRequest { url, format })
    };

    let mut options = ServerOptions::from_env(initial_state(&config, default_viewport(), ""));
    options.locations = source("FLOWMAP_LOCATIONS");
    options.flows = source("FLOWMAP_FLOWS");

    run_server(options).await?;
    Ok(())
}
