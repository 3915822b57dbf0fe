#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Point sampling of a single-band slope raster.
//!
//! A [`RasterSampler`] pairs the immutable [`RasterDataset`] metadata
//! (reference system, affine transform, bounds, nodata) with a
//! [`PixelSource`] that performs the actual reads. The `GeoTIFF` source
//! opens its own file handle for every sample, so no read position is
//! ever shared between requests.
//!
//! Points outside the raster, nodata pixels and NaN pixels are not errors:
//! they sample to `None`.

mod affine;
pub mod geotiff;
mod source;

pub use affine::{AffineTransform, Bounds};
pub use source::{GridPixels, PixelSource};

use landslide_projection::{Crs, Point2D, ProjectionError};

/// Errors from opening or reading a raster.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// The affine transform cannot be inverted.
    #[error("Invalid affine transform: {0}")]
    InvalidTransform(String),

    /// Georeferencing tags are missing or incomplete.
    #[error("Missing georeferencing: {0}")]
    MissingGeoreference(String),

    /// The raster layout or pixel type is not supported.
    #[error("Unsupported raster: {0}")]
    Unsupported(String),

    /// The raster reference system is unusable.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// A sample was requested with a point in another reference system.
    #[error("Point {point} is not in the raster reference system {expected}")]
    CrsMismatch {
        /// The offending point.
        point: String,
        /// The raster's reference system.
        expected: String,
    },

    /// A pixel read outside the grid.
    #[error("Pixel ({row}, {col}) is outside the {width}x{height} grid")]
    PixelOutOfRange {
        /// Requested row.
        row: u32,
        /// Requested column.
        col: u32,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },
}

/// Immutable metadata of a single-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDataset {
    crs: Crs,
    transform: AffineTransform,
    bounds: Bounds,
    width: u32,
    height: u32,
    nodata: Option<f64>,
}

impl RasterDataset {
    /// Describes a `width` x `height` grid placed by `transform`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Unsupported`] for an empty grid.
    pub fn new(
        crs: Crs,
        transform: AffineTransform,
        width: u32,
        height: u32,
        nodata: Option<f64>,
    ) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::Unsupported(format!(
                "empty {width}x{height} grid"
            )));
        }
        Ok(Self {
            bounds: transform.bounds(width, height),
            crs,
            transform,
            width,
            height,
            nodata,
        })
    }

    /// Reference system of the grid.
    #[must_use]
    pub const fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Pixel to world transform.
    #[must_use]
    pub const fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    /// World rectangle covered by the grid.
    #[must_use]
    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Declared nodata sentinel.
    #[must_use]
    pub const fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Integer `(row, col)` of the pixel holding `(x, y)`, or `None` when
    /// the position is outside the bounds or falls off the grid after
    /// flooring.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixel_index(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        if !self.bounds.contains(x, y) {
            return None;
        }

        let (col, row) = self.transform.to_pixel(x, y);
        let (col, row) = (col.floor(), row.floor());

        // Bounds-edge points can floor to one past the last row/column.
        if !(0.0..f64::from(self.height)).contains(&row) || !(0.0..f64::from(self.width)).contains(&col) {
            return None;
        }

        Some((row as u32, col as u32))
    }
}

/// Samples values from a raster at world positions.
pub struct RasterSampler {
    dataset: RasterDataset,
    pixels: Box<dyn PixelSource>,
}

impl RasterSampler {
    /// Pairs raster metadata with a pixel reader.
    #[must_use]
    pub fn new(dataset: RasterDataset, pixels: Box<dyn PixelSource>) -> Self {
        Self { dataset, pixels }
    }

    /// The raster metadata.
    #[must_use]
    pub const fn dataset(&self) -> &RasterDataset {
        &self.dataset
    }

    /// Samples the pixel under `point`.
    ///
    /// Returns `Ok(None)` when the point is outside the raster bounds, lands
    /// off the grid, or the pixel holds nodata or NaN.
    ///
    /// # Errors
    ///
    /// * [`RasterError::CrsMismatch`] if `point` is not in the raster's
    ///   reference system
    /// * any error from the underlying [`PixelSource`]
    pub fn sample(&self, point: &Point2D) -> Result<Option<f64>, RasterError> {
        if !point.is_in(&self.dataset.crs) {
            return Err(RasterError::CrsMismatch {
                point: point.to_string(),
                expected: self.dataset.crs.to_string(),
            });
        }

        let Some((row, col)) = self.dataset.pixel_index(point.x, point.y) else {
            log::trace!("{point} is outside the raster grid");
            return Ok(None);
        };

        let value = self.pixels.read_pixel(row, col)?;

        #[allow(clippy::float_cmp)]
        let is_nodata = self.dataset.nodata.is_some_and(|nodata| value == nodata);

        if is_nodata || value.is_nan() {
            return Ok(None);
        }

        Ok(Some(value))
    }
}
