//! Random-access pixel readers.

use crate::RasterError;

/// Reads single pixels from a one-band grid.
///
/// Implementations must not keep a shared read cursor: every call is an
/// independent read so that request workers can sample concurrently.
pub trait PixelSource: Send + Sync {
    /// Reads the value at `(row, col)` as `f64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read or the
    /// position is outside the grid.
    fn read_pixel(&self, row: u32, col: u32) -> Result<f64, RasterError>;
}

/// A fully materialised row-major grid.
#[derive(Debug, Clone)]
pub struct GridPixels {
    width: u32,
    height: u32,
    values: Vec<f64>,
}

impl GridPixels {
    /// Wraps `values` laid out row by row.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Unsupported`] if `values` does not hold
    /// exactly `width * height` entries.
    pub fn new(width: u32, height: u32, values: Vec<f64>) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize;
        if values.len() != expected {
            return Err(RasterError::Unsupported(format!(
                "grid of {width}x{height} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }
}

impl PixelSource for GridPixels {
    fn read_pixel(&self, row: u32, col: u32) -> Result<f64, RasterError> {
        if row >= self.height || col >= self.width {
            return Err(RasterError::PixelOutOfRange {
                row,
                col,
                width: self.width,
                height: self.height,
            });
        }
        Ok(self.values[row as usize * self.width as usize + col as usize])
    }
}
