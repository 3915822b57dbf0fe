#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference systems and coordinate reprojection.
//!
//! Every coordinate pair in the landslide service is a [`Point2D`] tagged
//! with the [`Crs`] it is expressed in. Queries always arrive as WGS84
//! longitude/latitude and are reprojected with a [`CoordinateTransformer`]
//! into whatever system the soil polygons or the slope raster use.
//!
//! Projection math is done by `proj4rs` (pure Rust, no system PROJ
//! install required).

mod crs;
mod transformer;

pub use crs::{Crs, EPSG_NAD83, EPSG_WEB_MERCATOR, EPSG_WGS84};
pub use transformer::{CoordinateTransformer, transform};

/// Errors from reference system parsing and reprojection.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The input coordinate is non-finite, out of the WGS84 domain, or
    /// cannot be projected into the target system.
    #[error("Invalid coordinate ({x}, {y}): {reason}")]
    InvalidCoordinate {
        /// X (longitude) component as received.
        x: f64,
        /// Y (latitude) component as received.
        y: f64,
        /// Why the coordinate was rejected.
        reason: String,
    },

    /// The reference system is not one this service knows how to build.
    #[error("Unsupported reference system: {0}")]
    UnsupportedCrs(String),

    /// The PROJ.4 definition could not be parsed.
    #[error("Invalid projection definition for {crs}: {message}")]
    InvalidDefinition {
        /// Reference system the definition belongs to.
        crs: String,
        /// Parser message.
        message: String,
    },
}

/// A coordinate pair tagged with its reference system.
///
/// `x` is always the easting/longitude axis and `y` the northing/latitude
/// axis, independent of the axis order the reference system itself
/// declares.
#[derive(Debug, Clone, PartialEq)]
pub struct Point2D {
    /// Easting or longitude.
    pub x: f64,
    /// Northing or latitude.
    pub y: f64,
    /// Reference system the pair is expressed in.
    pub crs: Crs,
}

impl Point2D {
    /// Creates a point in the given reference system.
    #[must_use]
    pub const fn new(x: f64, y: f64, crs: Crs) -> Self {
        Self { x, y, crs }
    }

    /// Creates a WGS84 point from a longitude and a latitude in degrees.
    #[must_use]
    pub const fn lon_lat(lon: f64, lat: f64) -> Self {
        Self::new(lon, lat, Crs::WGS84)
    }

    /// Whether both components are finite numbers.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Whether the point is tagged with `crs`.
    #[must_use]
    pub fn is_in(&self, crs: &Crs) -> bool {
        &self.crs == crs
    }

    /// Checks that the point is a usable WGS84 longitude/latitude pair.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidCoordinate`] if the point is not
    /// tagged WGS84, is non-finite, or lies outside
    /// `[-180, 180] x [-90, 90]`.
    pub fn validate_lon_lat(&self) -> Result<(), ProjectionError> {
        let reason = if !self.is_in(&Crs::WGS84) {
            format!("expected an EPSG:4326 coordinate, got {}", self.crs)
        } else if !self.is_finite() {
            "non-finite component".to_string()
        } else if self.x.abs() > 180.0 {
            "longitude outside [-180, 180]".to_string()
        } else if self.y.abs() > 90.0 {
            "latitude outside [-90, 90]".to_string()
        } else {
            return Ok(());
        };

        Err(ProjectionError::InvalidCoordinate {
            x: self.x,
            y: self.y,
            reason,
        })
    }
}

impl std::fmt::Display for Point2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}) [{}]", self.x, self.y, self.crs)
    }
}
