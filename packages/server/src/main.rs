#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Landslide risk API server.
//!
//! Reads the configuration file named by `LANDSLIDE_CONFIG` (if any),
//! applies `BIND_ADDR` / `PORT` overrides and serves until stopped.

use landslide_server::LandslideConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = LandslideConfig::load(None).map_err(std::io::Error::other)?;

    landslide_server::run_server(config).await
}
