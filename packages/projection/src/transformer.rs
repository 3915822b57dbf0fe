//! WGS84 to target reference system conversion.

use std::borrow::Cow;

use proj4rs::proj::Proj;
use proj4rs::transform::transform as proj_transform;

use crate::{Crs, Point2D, ProjectionError};

/// Converts WGS84 longitude/latitude points into a target reference system.
///
/// The transformer only keeps the two projection definitions. Each call to
/// [`CoordinateTransformer::transform`] builds its own projection state, so
/// a single transformer can be shared freely across request workers.
#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    target: Crs,
    strategy: Strategy,
}

#[derive(Debug, Clone)]
enum Strategy {
    /// Target is WGS84 itself.
    Identity,
    /// Generic `proj4rs` conversion.
    Proj4 {
        source_def: Cow<'static, str>,
        target_def: Cow<'static, str>,
        target_is_geographic: bool,
    },
}

impl CoordinateTransformer {
    /// Creates a transformer from WGS84 into `target`.
    ///
    /// Both definitions are parsed once here so that an unusable target is
    /// reported at startup rather than on the first query.
    ///
    /// # Errors
    ///
    /// * [`ProjectionError::UnsupportedCrs`] if `target` is an EPSG code
    ///   without a built-in definition
    /// * [`ProjectionError::InvalidDefinition`] if a definition does not
    ///   parse
    pub fn new(target: Crs) -> Result<Self, ProjectionError> {
        if target.is_wgs84() {
            return Ok(Self {
                target,
                strategy: Strategy::Identity,
            });
        }

        let source_def = Crs::WGS84.definition()?;
        let target_def = target.definition()?;

        parse_proj(&Crs::WGS84, &source_def)?;
        parse_proj(&target, &target_def)?;

        log::debug!("Built coordinate transformer EPSG:4326 -> {target}");

        Ok(Self {
            strategy: Strategy::Proj4 {
                source_def,
                target_def,
                target_is_geographic: target.is_geographic(),
            },
            target,
        })
    }

    /// The reference system points are converted into.
    #[must_use]
    pub const fn target(&self) -> &Crs {
        &self.target
    }

    /// Converts a WGS84 point into the target reference system.
    ///
    /// The input is always read as `x = longitude`, `y = latitude`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidCoordinate`] if the point is not
    /// tagged WGS84, is non-finite, lies outside `[-180, 180] x [-90, 90]`,
    /// or projects to a non-finite value.
    pub fn transform(&self, point: &Point2D) -> Result<Point2D, ProjectionError> {
        point.validate_lon_lat()?;

        let Strategy::Proj4 {
            source_def,
            target_def,
            target_is_geographic,
        } = &self.strategy
        else {
            return Ok(Point2D::new(point.x, point.y, self.target.clone()));
        };

        let source = parse_proj(&Crs::WGS84, source_def)?;
        let target = parse_proj(&self.target, target_def)?;

        let mut xyz = (point.x.to_radians(), point.y.to_radians(), 0.0);
        proj_transform(&source, &target, &mut xyz).map_err(|e| invalid(point, format!("{e:?}")))?;

        let (x, y) = if *target_is_geographic {
            (xyz.0.to_degrees(), xyz.1.to_degrees())
        } else {
            (xyz.0, xyz.1)
        };

        if !x.is_finite() || !y.is_finite() {
            return Err(invalid(
                point,
                format!("projects to a non-finite position in {}", self.target),
            ));
        }

        Ok(Point2D::new(x, y, self.target.clone()))
    }
}

/// Converts a single WGS84 point into `target`.
///
/// Convenience for one-off conversions; long-lived callers should keep a
/// [`CoordinateTransformer`].
///
/// # Errors
///
/// Returns any error from [`CoordinateTransformer::new`] or
/// [`CoordinateTransformer::transform`].
pub fn transform(point: &Point2D, target: &Crs) -> Result<Point2D, ProjectionError> {
    CoordinateTransformer::new(target.clone())?.transform(point)
}

fn parse_proj(crs: &Crs, def: &str) -> Result<Proj, ProjectionError> {
    Proj::from_proj_string(def).map_err(|e| ProjectionError::InvalidDefinition {
        crs: crs.to_string(),
        message: format!("{e:?}"),
    })
}

fn invalid(point: &Point2D, reason: String) -> ProjectionError {
    ProjectionError::InvalidCoordinate {
        x: point.x,
        y: point.y,
        reason,
    }
}
