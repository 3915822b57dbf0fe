#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the landslide risk toolchain.
//!
//! ```text
//! landslide serve
//! landslide lookup --lon -97.94 --lat 29.88
//! landslide predict '{"soil_type": 523, "slope": 4.7}'
//! landslide predict --lon -97.94 --lat 29.88 --file weather.json
//! landslide inspect
//! ```
//!
//! Every command accepts `--config <path>`; otherwise `LANDSLIDE_CONFIG` is
//! used if set. Running with no subcommand enters interactive mode.

mod commands;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dialoguer::{Input, Select};
use landslide_server::{AppState, LandslideConfig};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "landslide", about = "Landslide risk lookups and predictions")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Print slope and soil type at a WGS84 position
    Lookup {
        /// Longitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Latitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
    },
    /// Classify a JSON object of model features
    Predict {
        /// Feature object as inline JSON
        input: Option<String>,
        /// Read the feature object from a file instead
        #[arg(long, conflicts_with = "input")]
        file: Option<PathBuf>,
        /// Take soil type and slope from a lookup at this longitude
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Take soil type and slope from a lookup at this latitude
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
    },
    /// Show the effective configuration and resource status
    Inspect,
}

/// Top-level tool selection for interactive mode.
enum Tool {
    Serve,
    Lookup,
    Predict,
    Inspect,
}

impl Tool {
    const ALL: &[Self] = &[Self::Serve, Self::Lookup, Self::Predict, Self::Inspect];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Serve => "Start server",
            Self::Lookup => "Look up slope and soil type",
            Self::Predict => "Predict landslide risk",
            Self::Inspect => "Inspect resources",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let config = LandslideConfig::load(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return interactive(config).await;
    };

    match command {
        Commands::Serve => serve(config, false).await?,
        Commands::Lookup { lon, lat } => {
            let state = AppState::load(&config);
            let attrs = commands::lookup(&state, lon, lat)?;
            println!("{}", serde_json::to_string_pretty(&attrs)?);
        }
        Commands::Predict {
            input,
            file,
            lon,
            lat,
        } => {
            let input = read_input(input.as_deref(), file.as_deref())?;
            let state = AppState::load(&config);
            let prediction = commands::predict(&state, &input, lon.zip(lat))?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Commands::Inspect => {
            let state = AppState::load(&config);
            print!("{}", commands::inspect(&config, &state)?);
        }
    }

    Ok(())
}

/// Runs the server on actix-web's own runtime.
async fn serve(config: LandslideConfig, prompt: bool) -> Result<(), Box<dyn std::error::Error>> {
    // The server uses actix-web's runtime, so we need to run it in a
    // blocking task to avoid nesting tokio runtimes.
    tokio::task::spawn_blocking(move || {
        actix_rt::System::new().block_on(async move {
            if prompt {
                landslide_server::interactive::run(config).await
            } else {
                landslide_server::run_server(config).await
            }
        })
    })
    .await??;

    Ok(())
}

fn read_input(input: Option<&str>, file: Option<&Path>) -> Result<Value, commands::CliError> {
    let text = match (input, file) {
        (_, Some(path)) => std::fs::read_to_string(path)?,
        (Some(input), None) => input.to_string(),
        (None, None) => "{}".to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

async fn interactive(config: LandslideConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Landslide Risk Toolchain");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::Serve => serve(config, true).await?,
        Tool::Lookup => {
            let (lon, lat) = prompt_position()?;
            let state = AppState::load(&config);
            let attrs = commands::lookup(&state, lon, lat)?;
            println!("{}", serde_json::to_string_pretty(&attrs)?);
        }
        Tool::Predict => {
            let (lon, lat) = prompt_position()?;
            let weather: String = Input::new()
                .with_prompt("Weather fields (JSON object)")
                .default("{}".to_string())
                .interact_text()?;
            let input: Value = serde_json::from_str(&weather)?;
            let state = AppState::load(&config);
            let prediction = commands::predict(&state, &input, Some((lon, lat)))?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Tool::Inspect => {
            let state = AppState::load(&config);
            print!("{}", commands::inspect(&config, &state)?);
        }
    }

    Ok(())
}

fn prompt_position() -> Result<(f64, f64), dialoguer::Error> {
    let lon: f64 = Input::new().with_prompt("Longitude").interact_text()?;
    let lat: f64 = Input::new().with_prompt("Latitude").interact_text()?;
    Ok((lon, lat))
}
