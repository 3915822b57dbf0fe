#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for landslide risk queries.
//!
//! Loads the soil polygons, the slope raster and the model artifacts once
//! at startup, then serves geo-attribute lookups and risk predictions. A
//! resource that fails to load does not stop the server: requests that
//! need it are answered with `503` while everything else keeps working.

pub mod config;
mod handlers;
pub mod interactive;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use landslide_features::{GeoFeatureResolver, Resource};
use landslide_inference::InferenceEngine;
use landslide_spatial::PolygonAttributeIndex;

pub use config::{ConfigError, LandslideConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Slope and soil lookups.
    pub resolver: Arc<GeoFeatureResolver>,
    /// Scaler and classifier.
    pub engine: Arc<InferenceEngine>,
}

impl AppState {
    #[must_use]
    pub fn new(resolver: GeoFeatureResolver, engine: InferenceEngine) -> Self {
        Self {
            resolver: Arc::new(resolver),
            engine: Arc::new(engine),
        }
    }

    /// Loads every startup resource named by `config`.
    ///
    /// Individual load failures are logged and leave that resource
    /// unavailable.
    #[must_use]
    pub fn load(config: &LandslideConfig) -> Self {
        log::info!("Loading soil polygons from {}...", config.soil.path.display());
        let soil = Resource::from_result(
            PolygonAttributeIndex::load_geojson(
                &config.soil.path,
                &config.soil.attribute,
                config.soil.crs.clone(),
            )
            .inspect_err(|e| log::error!("Failed to load soil polygons: {e}")),
        );

        log::info!("Opening slope raster {}...", config.slope.path.display());
        let slope = Resource::from_result(
            landslide_raster::geotiff::open(&config.slope.path, config.slope.crs.clone())
                .inspect_err(|e| log::error!("Failed to open slope raster: {e}")),
        );

        log::info!("Loading model artifacts...");
        let engine = InferenceEngine::load(&config.model.scaler, &config.model.classifier);

        Self::new(GeoFeatureResolver::new(soil, slope), engine)
    }
}

/// Registers the API routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/get_geo_data", web::get().to(handlers::get_geo_data))
        .route("/predict", web::post().to(handlers::predict));
}

/// Starts the landslide risk API server.
///
/// Loads the startup resources and starts the Actix-Web HTTP server. This
/// is a regular async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: LandslideConfig) -> std::io::Result<()> {
    let state = web::Data::new(AppState::load(&config));

    let bind_addr = config.server.bind_addr.clone();
    let port = config.server.port;

    log::info!("Starting server on {bind_addr}:{port}");

    let mut server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    });

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server.bind((bind_addr, port))?.run().await
}
