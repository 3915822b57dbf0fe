#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geo-attribute resolution for a single longitude/latitude query.
//!
//! The [`GeoFeatureResolver`] owns the soil polygon index and the slope
//! raster, each paired with a transformer into its own reference system.
//! A layer that failed to load at startup is kept as
//! [`Resource::Unavailable`] and every query that needs it fails with
//! [`ResolveError::ResourceUnavailable`].

use std::fmt::Display;
use std::sync::Arc;

use landslide_projection::{CoordinateTransformer, Point2D, ProjectionError};
use landslide_raster::{RasterError, RasterSampler};
use landslide_spatial::{AttributeLookup, PolygonAttributeIndex, SpatialError};

/// Errors from resolving a query point.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The longitude/latitude pair is unusable.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(#[from] ProjectionError),

    /// The polygon index rejected the query point.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(#[from] SpatialError),

    /// A layer needed by the query failed to load at startup.
    #[error("{resource} is unavailable: {reason}")]
    ResourceUnavailable {
        /// Which layer.
        resource: &'static str,
        /// Why it failed to load.
        reason: String,
    },

    /// Reading the raster failed.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),
}

/// A startup resource: loaded, or the reason it is not.
#[derive(Debug)]
pub enum Resource<T> {
    /// Ready for use.
    Loaded(Arc<T>),
    /// Failed to load; the message is reported to every caller.
    Unavailable(String),
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Loaded(value) => Self::Loaded(Arc::clone(value)),
            Self::Unavailable(reason) => Self::Unavailable(reason.clone()),
        }
    }
}

impl<T> Resource<T> {
    /// Wraps a load result, keeping the error text on failure.
    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Loaded(Arc::new(value)),
            Err(e) => Self::Unavailable(e.to_string()),
        }
    }

    /// Whether the resource loaded.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// The loaded value, if any.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value.as_ref()),
            Self::Unavailable(_) => None,
        }
    }

    /// The loaded value, or [`ResolveError::ResourceUnavailable`] naming
    /// `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ResourceUnavailable`] if loading failed.
    pub fn require(&self, resource: &'static str) -> Result<&T, ResolveError> {
        match self {
            Self::Loaded(value) => Ok(value.as_ref()),
            Self::Unavailable(reason) => Err(ResolveError::ResourceUnavailable {
                resource,
                reason: reason.clone(),
            }),
        }
    }
}

/// Attributes resolved for one query point.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoAttributes {
    /// Slope at the point, `None` outside the raster or on nodata.
    pub slope: Option<f64>,
    /// Soil type label; `"Unknown"` outside every polygon, `None` for an
    /// explicitly null attribute.
    pub soil_type: Option<String>,
}

struct SoilLayer {
    index: Arc<PolygonAttributeIndex>,
    to_index_crs: CoordinateTransformer,
}

struct SlopeLayer {
    sampler: Arc<RasterSampler>,
    to_raster_crs: CoordinateTransformer,
}

/// Answers `(lon, lat) -> {slope, soil_type}` queries.
pub struct GeoFeatureResolver {
    soil: Resource<SoilLayer>,
    slope: Resource<SlopeLayer>,
}

impl GeoFeatureResolver {
    /// Pairs each loaded layer with a transformer into its reference
    /// system. A layer whose reference system cannot be targeted becomes
    /// unavailable.
    #[must_use]
    pub fn new(soil: Resource<PolygonAttributeIndex>, slope: Resource<RasterSampler>) -> Self {
        let soil = match soil {
            Resource::Loaded(index) => {
                Resource::from_result(CoordinateTransformer::new(index.crs().clone()).map(
                    |to_index_crs| SoilLayer {
                        index,
                        to_index_crs,
                    },
                ))
            }
            Resource::Unavailable(reason) => Resource::Unavailable(reason),
        };

        let slope = match slope {
            Resource::Loaded(sampler) => Resource::from_result(
                CoordinateTransformer::new(sampler.dataset().crs().clone()).map(|to_raster_crs| {
                    SlopeLayer {
                        sampler,
                        to_raster_crs,
                    }
                }),
            ),
            Resource::Unavailable(reason) => Resource::Unavailable(reason),
        };

        if let Resource::Unavailable(reason) = &soil {
            log::warn!("Soil lookups disabled: {reason}");
        }
        if let Resource::Unavailable(reason) = &slope {
            log::warn!("Slope sampling disabled: {reason}");
        }

        Self { soil, slope }
    }

    /// Whether the soil index is usable.
    #[must_use]
    pub const fn soil_available(&self) -> bool {
        self.soil.is_available()
    }

    /// Whether the slope raster is usable.
    #[must_use]
    pub const fn slope_available(&self) -> bool {
        self.slope.is_available()
    }

    /// The soil index, if loaded.
    #[must_use]
    pub fn soil_index(&self) -> Option<&PolygonAttributeIndex> {
        self.soil.get().map(|layer| layer.index.as_ref())
    }

    /// The slope sampler, if loaded.
    #[must_use]
    pub fn slope_sampler(&self) -> Option<&RasterSampler> {
        self.slope.get().map(|layer| layer.sampler.as_ref())
    }

    /// Resolves slope and soil type at a WGS84 position.
    ///
    /// A valid position that cannot be projected into a layer's reference
    /// system is outside that layer: no slope, `"Unknown"` soil.
    ///
    /// # Errors
    ///
    /// * [`ResolveError::InvalidCoordinate`] for non-finite or
    ///   out-of-domain input
    /// * [`ResolveError::ResourceUnavailable`] if either layer failed to
    ///   load
    /// * [`ResolveError::Raster`] if the pixel read fails
    pub fn resolve(&self, lon: f64, lat: f64) -> Result<GeoAttributes, ResolveError> {
        let point = Point2D::lon_lat(lon, lat);
        point.validate_lon_lat()?;

        let slope = self.slope.require("Slope raster")?;
        let soil = self.soil.require("Soil index")?;

        let slope = match slope.to_raster_crs.transform(&point) {
            Ok(raster_point) => slope.sampler.sample(&raster_point)?,
            Err(e) => {
                log::debug!("{point} is outside the slope raster: {e}");
                None
            }
        };

        let soil_type = match soil.to_index_crs.transform(&point) {
            Ok(index_point) => soil.index.lookup(&index_point)?.to_label(),
            Err(e) => {
                log::debug!("{point} is outside the soil index: {e}");
                AttributeLookup::Unknown.to_label()
            }
        };

        log::debug!("Resolved {point}: slope={slope:?} soil_type={soil_type:?}");

        Ok(GeoAttributes { slope, soil_type })
    }
}
