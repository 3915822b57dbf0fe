//! Affine pixel/world mapping for north-up and rotated grids.

use crate::RasterError;

/// Six-coefficient affine transform between pixel and world coordinates.
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// `(col, row)` addresses the upper-left corner of a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    det: f64,
}

impl AffineTransform {
    /// Creates a transform from its six coefficients.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidTransform`] if a coefficient is
    /// non-finite or the transform is singular.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<Self, RasterError> {
        if [a, b, c, d, e, f].iter().any(|v| !v.is_finite()) {
            return Err(RasterError::InvalidTransform(
                "non-finite coefficient".to_string(),
            ));
        }

        let det = a.mul_add(e, -(b * d));
        if det.abs() < f64::EPSILON * a.abs().max(e.abs()).max(1e-300) {
            return Err(RasterError::InvalidTransform(format!(
                "singular transform (a={a}, b={b}, d={d}, e={e})"
            )));
        }

        Ok(Self { a, b, c, d, e, f, det })
    }

    /// Creates a north-up transform from the upper-left origin and the
    /// pixel size. `pixel_height` is normally negative.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidTransform`] for a zero pixel size.
    pub fn north_up(
        origin_x: f64,
        origin_y: f64,
        pixel_width: f64,
        pixel_height: f64,
    ) -> Result<Self, RasterError> {
        Self::new(pixel_width, 0.0, origin_x, 0.0, pixel_height, origin_y)
    }

    /// The coefficients as `(a, b, c, d, e, f)`.
    #[must_use]
    pub const fn coefficients(&self) -> (f64, f64, f64, f64, f64, f64) {
        (self.a, self.b, self.c, self.d, self.e, self.f)
    }

    /// Returns the same grid with its origin moved by a fraction of a pixel.
    #[must_use]
    pub fn shifted(&self, cols: f64, rows: f64) -> Self {
        let (x, y) = self.to_world(cols, rows);
        Self {
            c: x,
            f: y,
            ..*self
        }
    }

    /// Maps a (possibly fractional) pixel position to world coordinates.
    #[must_use]
    pub fn to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a.mul_add(col, self.b.mul_add(row, self.c)),
            self.d.mul_add(col, self.e.mul_add(row, self.f)),
        )
    }

    /// Maps world coordinates to a fractional `(col, row)` pixel position.
    #[must_use]
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.c;
        let dy = y - self.f;
        let col = self.e.mul_add(dx, -(self.b * dy)) / self.det;
        let row = self.a.mul_add(dy, -(self.d * dx)) / self.det;
        (col, row)
    }

    /// World bounding rectangle of a `width` x `height` grid.
    #[must_use]
    pub fn bounds(&self, width: u32, height: u32) -> Bounds {
        let w = f64::from(width);
        let h = f64::from(height);
        let corners = [
            self.to_world(0.0, 0.0),
            self.to_world(w, 0.0),
            self.to_world(0.0, h),
            self.to_world(w, h),
        ];

        let (mut left, mut bottom) = (f64::INFINITY, f64::INFINITY);
        let (mut right, mut top) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            left = left.min(x);
            right = right.max(x);
            bottom = bottom.min(y);
            top = top.max(y);
        }

        Bounds {
            left,
            bottom,
            right,
            top,
        }
    }
}

/// Axis-aligned world rectangle covered by a raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum x.
    pub left: f64,
    /// Minimum y.
    pub bottom: f64,
    /// Maximum x.
    pub right: f64,
    /// Maximum y.
    pub top: f64,
}

impl Bounds {
    /// Whether `(x, y)` lies inside the rectangle, edges included.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.left..=self.right).contains(&x) && (self.bottom..=self.top).contains(&y)
    }
}
