#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the flow map pipeline.
//!
//! ```text
//! flowmap layers --locations locations.csv --flows flows.csv [--json]
//! flowmap viewport --locations locations.csv --width 1280 --height 720
//! flowmap totals --flows flows.csv --query "s=A&lfm=OUTGOING"
//! flowmap query --config flowmap.toml --query "d=0"
//! flowmap serve --locations locations.csv --flows flows.csv
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use flowmap_flow_models::{DataFormat, LoadingStatus};
use flowmap_layers::{CircleColoring, LayersData};
use flowmap_server::{ServerOptions, run_server};
use flowmap_server_models::LoadRequest;
use flowmap_state::{Config, default_viewport, encode, initial_state};
use flowmap_state_models::FlowMapState;
use flowmap_worker::FlowMapService;

#[derive(Parser)]
#[command(name = "flowmap", about = "Build flow map layers from location and flow tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build circle and line layers and print a summary
    Layers {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        state: StateArgs,
        /// Print the full layers data as JSON
        #[arg(long)]
        json: bool,
        /// Color circles by net incoming/outgoing flow
        #[arg(long)]
        net_flow_colors: bool,
    },
    /// Print the viewport framing every location
    Viewport {
        #[command(flatten)]
        data: DataArgs,
        #[arg(long, default_value = "800")]
        width: f64,
        #[arg(long, default_value = "600")]
        height: f64,
    },
    /// Print filtered and unfiltered flow totals
    Totals {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Print the query string of the initial state
    Query {
        #[command(flatten)]
        state: StateArgs,
    },
    /// Start the HTTP API server
    Serve {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        state: StateArgs,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Locations table (URL or path)
    #[arg(long)]
    locations: Option<String>,
    /// Flows table (URL or path)
    #[arg(long)]
    flows: Option<String>,
    /// Table format: csv or gsheets
    #[arg(long, default_value = "csv")]
    format: DataFormat,
}

#[derive(Args)]
struct StateArgs {
    /// TOML or property,value CSV config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// URL query string applied over the config
    #[arg(long, default_value = "")]
    query: String,
}

impl StateArgs {
    fn initial_state(&self) -> Result<FlowMapState, Box<dyn std::error::Error>> {
        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        Ok(initial_state(&config, default_viewport(), &self.query))
    }
}

async fn load(
    service: &mut FlowMapService,
    data: &DataArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(url) = &data.locations
        && service.load_locations(url, data.format).await == LoadingStatus::Error
    {
        return Err(format!("Failed to load locations from {url}").into());
    }
    if let Some(url) = &data.flows
        && service.load_flows(url, data.format).await == LoadingStatus::Error
    {
        return Err(format!("Failed to load flows from {url}").into());
    }
    Ok(())
}

fn print_layers_summary(layers: &LayersData) {
    let circles = &layers.circle_attributes.attributes;
    let lines = &layers.line_attributes.attributes;
    let circle_bytes = circles.get_position.as_bytes().len()
        + circles.get_color.as_bytes().len()
        + circles.get_radius.as_bytes().len();
    let line_bytes = lines.get_source_position.as_bytes().len()
        + lines.get_target_position.as_bytes().len()
        + lines.get_thickness.as_bytes().len()
        + lines.get_color.as_bytes().len()
        + lines.get_endpoint_offsets.as_bytes().len();

    println!("{:<10} {:>8} {:>12}", "LAYER", "LENGTH", "BYTES");
    println!("{}", "-".repeat(32));
    println!(
        "{:<10} {:>8} {:>12}",
        "circles", layers.circle_attributes.length, circle_bytes
    );
    println!(
        "{:<10} {:>8} {:>12}",
        "lines", layers.line_attributes.length, line_bytes
    );
    if layers.skipped_flows > 0 {
        println!(
            "\n{} flow(s) skipped for unknown locations",
            layers.skipped_flows
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match cli.command {
        Commands::Layers {
            data,
            state,
            json,
            net_flow_colors,
        } => {
            let coloring = if net_flow_colors {
                CircleColoring::ByNetFlow
            } else {
                CircleColoring::Uniform
            };
            let mut service = FlowMapService::new().with_circle_coloring(coloring);
            service.set_flow_map_state(state.initial_state()?);
            load(&mut service, &data).await?;

            let Some(layers) = service.get_layers_data() else {
                return Err("Both --locations and --flows are required".into());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&layers)?);
            } else {
                print_layers_summary(&layers);
            }
        }
        Commands::Viewport {
            data,
            width,
            height,
        } => {
            let mut service = FlowMapService::new();
            load(&mut service, &data).await?;
            let Some(viewport) = service.get_viewport_for_locations([width, height]) else {
                return Err("--locations is required".into());
            };
            println!("{}", serde_json::to_string_pretty(&viewport)?);
        }
        Commands::Totals { data, state } => {
            let mut service = FlowMapService::new();
            service.set_flow_map_state(state.initial_state()?);
            load(&mut service, &data).await?;
            let Some(totals) = service.get_flow_totals() else {
                return Err("--flows is required".into());
            };
            println!("{}", serde_json::to_string_pretty(&totals)?);
        }
        Commands::Query { state } => {
            println!("{}", encode(&state.initial_state()?));
        }
        Commands::Serve { data, state } => {
            let request = |url: &Option<String>| {
                url.clone().map(|url| LoadRequest {
                    url,
                    format: data.format,
                })
            };
            let mut options = ServerOptions::from_env(state.initial_state()?);
            options.locations = request(&data.locations);
            options.flows = request(&data.flows);

            // actix-web drives its own runtime.
            tokio::task::spawn_blocking(move || {
                actix_web::rt::System::new().block_on(run_server(options))
            })
            .await??;
        }
    }

    Ok(())
}
