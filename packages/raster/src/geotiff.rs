//! `GeoTIFF` opening and per-sample pixel reads.
//!
//! Georeferencing is read from the standard `GeoTIFF` tags:
//!
//! - `ModelTransformationTag`, or `ModelPixelScaleTag` + `ModelTiepointTag`
//!   for the affine transform
//! - `GeoKeyDirectoryTag` for the reference system and raster type
//! - `GDAL_NODATA` for the nodata sentinel
//!
//! Pixel reads decode only the strip or tile holding the requested pixel,
//! through a file handle opened for that read alone.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use landslide_projection::Crs;
use tiff::ColorType;
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::{AffineTransform, PixelSource, RasterDataset, RasterError, RasterSampler};

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_RASTER_TYPE: u32 = 1025;
const KEY_GEOGRAPHIC_TYPE: u32 = 2048;
const KEY_PROJECTED_CS_TYPE: u32 = 3072;

const RASTER_PIXEL_IS_POINT: u32 = 2;
const USER_DEFINED: u32 = 32767;

const SAMPLE_FORMAT_FLOAT: u32 = 3;

/// Opens a single-band `GeoTIFF` as a [`RasterSampler`].
///
/// When `crs_override` is set it replaces whatever reference system the
/// file declares (or fails to declare).
///
/// # Errors
///
/// Returns an error if the file cannot be decoded, is not single-band, or
/// lacks the georeferencing needed to place it.
pub fn open(path: &Path, crs_override: Option<Crs>) -> Result<RasterSampler, RasterError> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

    let (width, height) = decoder.dimensions()?;
    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(RasterError::Unsupported(format!(
                "expected a single-band raster, found {other:?}"
            )));
        }
    }

    let geo_keys = read_geo_keys(&mut decoder)?;
    let transform = read_transform(&mut decoder, &geo_keys)?;

    let crs = match crs_override {
        Some(crs) => crs,
        None => crs_from_geo_keys(&geo_keys)?,
    };

    let nodata = read_nodata(&mut decoder)?.map(|nodata| {
        if is_single_precision_float(&mut decoder) {
            // The stored pixels are f32; compare against the sentinel at
            // the same precision.
            #[allow(clippy::cast_possible_truncation)]
            let narrowed = nodata as f32;
            f64::from(narrowed)
        } else {
            nodata
        }
    });

    let layout = ChunkLayout::read(&mut decoder, width, height)?;

    let dataset = RasterDataset::new(crs, transform, width, height, nodata)?;
    log::info!(
        "Opened raster {} ({}x{}, {}, bounds {:?}, nodata {:?})",
        path.display(),
        width,
        height,
        dataset.crs(),
        dataset.bounds(),
        dataset.nodata()
    );

    Ok(RasterSampler::new(
        dataset,
        Box::new(GeoTiffPixels {
            path: path.to_path_buf(),
            width,
            height,
            layout,
        }),
    ))
}

/// Reads pixels from a `GeoTIFF` on disk, one file handle per read.
#[derive(Debug, Clone)]
pub struct GeoTiffPixels {
    path: PathBuf,
    width: u32,
    height: u32,
    layout: ChunkLayout,
}

/// Strip or tile geometry of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkLayout {
    chunk_width: u32,
    chunk_height: u32,
    chunks_across: u32,
}

impl ChunkLayout {
    fn read<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
        width: u32,
        height: u32,
    ) -> Result<Self, RasterError> {
        let tile_width = decoder.find_tag(Tag::TileWidth)?.map(Value::into_u32).transpose()?;
        let tile_length = decoder.find_tag(Tag::TileLength)?.map(Value::into_u32).transpose()?;

        let (chunk_width, chunk_height) = match (tile_width, tile_length) {
            (Some(w), Some(h)) => (w, h),
            _ => {
                let rows_per_strip = decoder
                    .find_tag(Tag::RowsPerStrip)?
                    .map(Value::into_u32)
                    .transpose()?
                    .unwrap_or(height);
                (width, rows_per_strip.min(height))
            }
        };

        if chunk_width == 0 || chunk_height == 0 {
            return Err(RasterError::Unsupported(format!(
                "zero-sized chunks ({chunk_width}x{chunk_height})"
            )));
        }

        Ok(Self {
            chunk_width,
            chunk_height,
            chunks_across: width.div_ceil(chunk_width),
        })
    }

    /// Chunk index and the pixel's offset inside that chunk's data.
    fn locate(&self, row: u32, col: u32, width: u32, height: u32, chunk_len: usize) -> usize {
        let x0 = (col / self.chunk_width) * self.chunk_width;
        let y0 = (row / self.chunk_height) * self.chunk_height;
        let data_width = self.chunk_width.min(width - x0);
        let data_height = self.chunk_height.min(height - y0);

        // Edge tiles may come back cropped or padded to the full tile size.
        let stride = if chunk_len == self.chunk_width as usize * self.chunk_height as usize
            && chunk_len != data_width as usize * data_height as usize
        {
            self.chunk_width
        } else {
            data_width
        };

        (row - y0) as usize * stride as usize + (col - x0) as usize
    }

    const fn chunk_index(&self, row: u32, col: u32) -> u32 {
        (row / self.chunk_height) * self.chunks_across + col / self.chunk_width
    }
}

impl PixelSource for GeoTiffPixels {
    fn read_pixel(&self, row: u32, col: u32) -> Result<f64, RasterError> {
        if row >= self.height || col >= self.width {
            return Err(RasterError::PixelOutOfRange {
                row,
                col,
                width: self.width,
                height: self.height,
            });
        }

        let mut decoder = Decoder::new(BufReader::new(File::open(&self.path)?))?;
        let chunk = decoder.read_chunk(self.layout.chunk_index(row, col))?;
        let offset = self
            .layout
            .locate(row, col, self.width, self.height, decoding_len(&chunk));

        value_at(&chunk, offset).ok_or_else(|| {
            RasterError::Unsupported(format!(
                "pixel ({row}, {col}) missing from decoded chunk of {} values",
                decoding_len(&chunk)
            ))
        })
    }
}

/// Raw `GeoKeyDirectoryTag` entries as `(key, value)` pairs.
///
/// Only keys stored inline (tag location 0) are kept; all the keys this
/// module consults are SHORT values stored that way.
fn read_geo_keys<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Vec<(u32, u32)>, RasterError> {
    let Some(directory) = decoder.find_tag(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY))? else {
        return Ok(Vec::new());
    };
    let directory = directory.into_u32_vec()?;

    Ok(parse_geo_keys(&directory))
}

fn parse_geo_keys(directory: &[u32]) -> Vec<(u32, u32)> {
    let Some(header) = directory.get(..4) else {
        return Vec::new();
    };
    let count = header[3] as usize;

    directory[4..]
        .chunks_exact(4)
        .take(count)
        .filter(|entry| entry[1] == 0)
        .map(|entry| (entry[0], entry[3]))
        .collect()
}

fn geo_key(keys: &[(u32, u32)], key: u32) -> Option<u32> {
    keys.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn crs_from_geo_keys(keys: &[(u32, u32)]) -> Result<Crs, RasterError> {
    let code = geo_key(keys, KEY_PROJECTED_CS_TYPE)
        .or_else(|| geo_key(keys, KEY_GEOGRAPHIC_TYPE))
        .ok_or_else(|| {
            RasterError::MissingGeoreference(
                "no ProjectedCSTypeGeoKey or GeographicTypeGeoKey; configure the raster CRS"
                    .to_string(),
            )
        })?;

    if code == USER_DEFINED {
        return Err(RasterError::MissingGeoreference(
            "user-defined reference system; configure the raster CRS".to_string(),
        ));
    }

    Ok(Crs::Epsg(code))
}

fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    geo_keys: &[(u32, u32)],
) -> Result<AffineTransform, RasterError> {
    let matrix = read_f64_tag(decoder, TAG_MODEL_TRANSFORMATION)?;
    let transform = if let Some(m) = matrix.filter(|m| m.len() >= 8) {
        AffineTransform::new(m[0], m[1], m[3], m[4], m[5], m[7])?
    } else {
        let scale = read_f64_tag(decoder, TAG_MODEL_PIXEL_SCALE)?;
        let tiepoint = read_f64_tag(decoder, TAG_MODEL_TIEPOINT)?;
        match (scale, tiepoint) {
            (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
                let (sx, sy) = (scale[0], scale[1]);
                let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
                AffineTransform::north_up(sx.mul_add(-i, x), sy.mul_add(j, y), sx, -sy)?
            }
            _ => {
                return Err(RasterError::MissingGeoreference(
                    "no ModelTransformationTag or ModelPixelScaleTag/ModelTiepointTag".to_string(),
                ));
            }
        }
    };

    if geo_key(geo_keys, KEY_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT) {
        // Tie points address pixel centres; move the origin to the corner.
        return Ok(transform.shifted(-0.5, -0.5));
    }

    Ok(transform)
}

fn read_f64_tag<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    tag: u16,
) -> Result<Option<Vec<f64>>, RasterError> {
    Ok(decoder
        .find_tag(Tag::from_u16_exhaustive(tag))?
        .map(Value::into_f64_vec)
        .transpose()?)
}

fn read_nodata<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Option<f64>, RasterError> {
    let Some(value) = decoder.find_tag(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());

    match text.parse::<f64>() {
        Ok(nodata) => Ok(Some(nodata)),
        Err(_) => {
            log::warn!("Ignoring unparsable GDAL_NODATA value {text:?}");
            Ok(None)
        }
    }
}

fn is_single_precision_float<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> bool {
    let format = decoder
        .find_tag(Tag::SampleFormat)
        .ok()
        .flatten()
        .and_then(|v| v.into_u32_vec().ok())
        .and_then(|v| v.first().copied());
    let bits = decoder
        .find_tag(Tag::BitsPerSample)
        .ok()
        .flatten()
        .and_then(|v| v.into_u32_vec().ok())
        .and_then(|v| v.first().copied());
    format == Some(SAMPLE_FORMAT_FLOAT) && bits == Some(32)
}

fn decoding_len(result: &DecodingResult) -> usize {
    match result {
        DecodingResult::U8(v) => v.len(),
        DecodingResult::U16(v) => v.len(),
        DecodingResult::U32(v) => v.len(),
        DecodingResult::U64(v) => v.len(),
        DecodingResult::I8(v) => v.len(),
        DecodingResult::I16(v) => v.len(),
        DecodingResult::I32(v) => v.len(),
        DecodingResult::I64(v) => v.len(),
        DecodingResult::F32(v) => v.len(),
        DecodingResult::F64(v) => v.len(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn value_at(result: &DecodingResult, idx: usize) -> Option<f64> {
    match result {
        DecodingResult::U8(v) => v.get(idx).map(|&x| f64::from(x)),
        DecodingResult::U16(v) => v.get(idx).map(|&x| f64::from(x)),
        DecodingResult::U32(v) => v.get(idx).map(|&x| f64::from(x)),
        DecodingResult::U64(v) => v.get(idx).map(|&x| x as f64),
        DecodingResult::I8(v) => v.get(idx).map(|&x| f64::from(x)),
        DecodingResult::I16(v) => v.get(idx).map(|&x| f64::from(x)),
        DecodingResult::I32(v) => v.get(idx).map(|&x| f64::from(x)),
        DecodingResult::I64(v) => v.get(idx).map(|&x| x as f64),
        DecodingResult::F32(v) => v.get(idx).map(|&x| f64::from(x)),
        DecodingResult::F64(v) => v.get(idx).copied(),
    }
}

#[cfg(test)]
mod tests {
    use landslide_projection::Point2D;
    use tiff::encoder::{TiffEncoder, colortype};

    use super::*;

    const PROJECTED_KEYS: [u16; 12] = [1, 1, 0, 2, 1025, 0, 1, 1, 3072, 0, 1, 32614];

    struct TempTiff(PathBuf);

    impl Drop for TempTiff {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[derive(Default)]
    struct Tags<'a> {
        pixel_scale: Option<&'a [f64]>,
        tiepoint: Option<&'a [f64]>,
        transformation: Option<&'a [f64]>,
        geo_keys: Option<&'a [u16]>,
        nodata: Option<&'a str>,
    }

    /// 4x3 float raster, one row per strip.
    fn write_f32(values: &[f32], tags: &Tags<'_>) -> TempTiff {
        let path = std::env::temp_dir().join(format!("landslide-raster-{}.tif", uuid::Uuid::new_v4()));
        let mut file = File::create(&path).unwrap();
        let mut tiff = TiffEncoder::new(&mut file).unwrap();
        let mut image = tiff.new_image::<colortype::Gray32Float>(4, 3).unwrap();
        image.rows_per_strip(1).unwrap();

        let dir = image.encoder();
        if let Some(v) = tags.pixel_scale {
            dir.write_tag(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE), v).unwrap();
        }
        if let Some(v) = tags.tiepoint {
            dir.write_tag(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT), v).unwrap();
        }
        if let Some(v) = tags.transformation {
            dir.write_tag(Tag::from_u16_exhaustive(TAG_MODEL_TRANSFORMATION), v).unwrap();
        }
        if let Some(v) = tags.geo_keys {
            dir.write_tag(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY), v).unwrap();
        }
        if let Some(v) = tags.nodata {
            dir.write_tag(Tag::from_u16_exhaustive(TAG_GDAL_NODATA), v).unwrap();
        }

        image.write_data(values).unwrap();
        TempTiff(path)
    }

    fn ramp() -> Vec<f32> {
        (0..12u8).map(f32::from).collect()
    }

    fn standard_tags() -> Tags<'static> {
        Tags {
            pixel_scale: Some(&[10.0, 10.0, 0.0]),
            tiepoint: Some(&[0.0, 0.0, 0.0, 100.0, 200.0, 0.0]),
            geo_keys: Some(&PROJECTED_KEYS),
            nodata: Some("-9999"),
            ..Tags::default()
        }
    }

    fn utm(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y, Crs::Epsg(32614))
    }

    #[test]
    fn reads_georeferencing_from_scale_and_tiepoint() {
        let file = write_f32(&ramp(), &standard_tags());
        let sampler = open(&file.0, None).unwrap();
        let dataset = sampler.dataset();

        assert_eq!(dataset.crs(), &Crs::Epsg(32614));
        assert_eq!((dataset.width(), dataset.height()), (4, 3));
        assert_eq!(dataset.nodata(), Some(-9999.0));
        assert_eq!(
            dataset.bounds(),
            crate::Bounds {
                left: 100.0,
                bottom: 170.0,
                right: 140.0,
                top: 200.0,
            }
        );
    }

    #[test]
    fn samples_values_from_the_right_strip() {
        let file = write_f32(&ramp(), &standard_tags());
        let sampler = open(&file.0, None).unwrap();

        assert_eq!(sampler.sample(&utm(105.0, 195.0)).unwrap(), Some(0.0));
        assert_eq!(sampler.sample(&utm(125.0, 185.0)).unwrap(), Some(6.0));
        assert_eq!(sampler.sample(&utm(139.0, 171.0)).unwrap(), Some(11.0));
        assert_eq!(sampler.sample(&utm(95.0, 185.0)).unwrap(), None);
    }

    #[test]
    fn float_values_widen_exactly() {
        let mut values = vec![0.0_f32; 12];
        values[5] = 4.7;
        let file = write_f32(&values, &standard_tags());
        let sampler = open(&file.0, None).unwrap();

        assert_eq!(
            sampler.sample(&utm(115.0, 185.0)).unwrap(),
            Some(f64::from(4.7_f32))
        );
    }

    #[test]
    fn nodata_and_nan_pixels_are_none() {
        let mut values = ramp();
        values[0] = -9999.0;
        values[1] = f32::NAN;
        let file = write_f32(&values, &standard_tags());
        let sampler = open(&file.0, None).unwrap();

        assert_eq!(sampler.sample(&utm(105.0, 195.0)).unwrap(), None);
        assert_eq!(sampler.sample(&utm(115.0, 195.0)).unwrap(), None);
        assert_eq!(sampler.sample(&utm(125.0, 195.0)).unwrap(), Some(2.0));
    }

    #[test]
    fn fractional_nodata_matches_at_single_precision() {
        let mut values = ramp();
        values[0] = -3.4e38;
        let tags = Tags {
            nodata: Some("-3.4e+38"),
            ..standard_tags()
        };
        let file = write_f32(&values, &tags);
        let sampler = open(&file.0, None).unwrap();

        assert_eq!(sampler.sample(&utm(105.0, 195.0)).unwrap(), None);
    }

    #[test]
    fn model_transformation_tag() {
        #[rustfmt::skip]
        let matrix = [
            10.0, 0.0, 0.0, 100.0,
            0.0, -10.0, 0.0, 200.0,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        let tags = Tags {
            transformation: Some(&matrix),
            geo_keys: Some(&PROJECTED_KEYS),
            ..Tags::default()
        };
        let file = write_f32(&ramp(), &tags);
        let sampler = open(&file.0, None).unwrap();

        assert_eq!(sampler.dataset().nodata(), None);
        assert_eq!(sampler.sample(&utm(125.0, 185.0)).unwrap(), Some(6.0));
    }

    #[test]
    fn pixel_is_point_shifts_half_a_pixel() {
        let keys: [u16; 12] = [1, 1, 0, 2, 1025, 0, 1, 2, 3072, 0, 1, 32614];
        let tags = Tags {
            geo_keys: Some(&keys),
            ..standard_tags()
        };
        let file = write_f32(&ramp(), &tags);
        let sampler = open(&file.0, None).unwrap();

        assert_eq!(sampler.dataset().bounds().left, 95.0);
        assert_eq!(sampler.dataset().bounds().top, 205.0);
        assert_eq!(sampler.sample(&utm(96.0, 204.0)).unwrap(), Some(0.0));
    }

    #[test]
    fn geographic_key_is_used_without_projected_key() {
        let keys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326];
        let tags = Tags {
            pixel_scale: Some(&[0.5, 0.5, 0.0]),
            tiepoint: Some(&[0.0, 0.0, 0.0, -98.0, 30.0, 0.0]),
            geo_keys: Some(&keys),
            ..Tags::default()
        };
        let file = write_f32(&ramp(), &tags);
        let sampler = open(&file.0, None).unwrap();

        assert_eq!(sampler.dataset().crs(), &Crs::WGS84);
        assert_eq!(
            sampler.sample(&Point2D::lon_lat(-97.25, 29.25)).unwrap(),
            Some(5.0)
        );
    }

    #[test]
    fn missing_crs_needs_an_override() {
        let tags = Tags {
            geo_keys: None,
            ..standard_tags()
        };
        let file = write_f32(&ramp(), &tags);

        assert!(matches!(
            open(&file.0, None),
            Err(RasterError::MissingGeoreference(_))
        ));

        let sampler = open(&file.0, Some(Crs::Epsg(32614))).unwrap();
        assert_eq!(sampler.dataset().crs(), &Crs::Epsg(32614));
    }

    #[test]
    fn override_replaces_declared_crs() {
        let file = write_f32(&ramp(), &standard_tags());
        let sampler = open(&file.0, Some(Crs::Epsg(3083))).unwrap();
        assert_eq!(sampler.dataset().crs(), &Crs::Epsg(3083));
    }

    #[test]
    fn missing_transform_is_an_error() {
        let tags = Tags {
            pixel_scale: None,
            ..standard_tags()
        };
        let file = write_f32(&ramp(), &tags);

        assert!(matches!(
            open(&file.0, None),
            Err(RasterError::MissingGeoreference(_))
        ));
    }

    #[test]
    fn multi_band_is_rejected() {
        let path = std::env::temp_dir().join(format!("landslide-raster-{}.tif", uuid::Uuid::new_v4()));
        {
            let mut file = File::create(&path).unwrap();
            let mut tiff = TiffEncoder::new(&mut file).unwrap();
            tiff.write_image::<colortype::RGB8>(2, 1, &[0, 0, 0, 255, 255, 255])
                .unwrap();
        }
        let file = TempTiff(path);

        assert!(matches!(
            open(&file.0, None),
            Err(RasterError::Unsupported(_))
        ));
    }

    /// 20x20 float raster in 16x16 tiles, pixel value `row * 20 + col`,
    /// origin (1000, 2000) with 1 m pixels. The encoder only writes
    /// strips, so the file is laid out by hand.
    fn write_tiled_f32() -> TempTiff {
        const SIZE: u32 = 20;
        const TILE: u32 = 16;
        const SHORT: u16 = 3;
        const LONG: u16 = 4;
        const DOUBLE: u16 = 12;
        const ENTRIES: u16 = 14;

        let tiles_across = SIZE.div_ceil(TILE);
        let tile_count = tiles_across * tiles_across;
        let tile_bytes = TILE * TILE * 4;

        // Tiles are always stored at full size; edge tiles are padded.
        let mut tiles = Vec::new();
        for tile in 0..tile_count {
            let (y0, x0) = ((tile / tiles_across) * TILE, (tile % tiles_across) * TILE);
            for row in y0..y0 + TILE {
                for col in x0..x0 + TILE {
                    let value = if row < SIZE && col < SIZE {
                        f32::from(u16::try_from(row * SIZE + col).unwrap())
                    } else {
                        -1.0
                    };
                    tiles.extend_from_slice(&value.to_le_bytes());
                }
            }
        }

        let offsets_at = 8 + 2 + u32::from(ENTRIES) * 12 + 4;
        let counts_at = offsets_at + 4 * tile_count;
        let scale_at = counts_at + 4 * tile_count;
        let tiepoint_at = scale_at + 3 * 8;
        let keys_at = tiepoint_at + 6 * 8;
        let data_at = keys_at + 2 * u32::try_from(PROJECTED_KEYS.len()).unwrap();

        let entries: [(u16, u16, u32, u32); 14] = [
            (256, SHORT, 1, SIZE),
            (257, SHORT, 1, SIZE),
            (258, SHORT, 1, 32),
            (259, SHORT, 1, 1),
            (262, SHORT, 1, 1),
            (277, SHORT, 1, 1),
            (322, SHORT, 1, TILE),
            (323, SHORT, 1, TILE),
            (324, LONG, tile_count, offsets_at),
            (325, LONG, tile_count, counts_at),
            (339, SHORT, 1, SAMPLE_FORMAT_FLOAT),
            (TAG_MODEL_PIXEL_SCALE, DOUBLE, 3, scale_at),
            (TAG_MODEL_TIEPOINT, DOUBLE, 6, tiepoint_at),
            (TAG_GEO_KEY_DIRECTORY, SHORT, 12, keys_at),
        ];

        let mut bytes = b"II*\0".to_vec();
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&ENTRIES.to_le_bytes());
        for (tag, kind, count, value) in entries {
            bytes.extend_from_slice(&tag.to_le_bytes());
            bytes.extend_from_slice(&kind.to_le_bytes());
            bytes.extend_from_slice(&count.to_le_bytes());
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.extend_from_slice(&0u32.to_le_bytes());

        for tile in 0..tile_count {
            bytes.extend_from_slice(&(data_at + tile * tile_bytes).to_le_bytes());
        }
        for _ in 0..tile_count {
            bytes.extend_from_slice(&tile_bytes.to_le_bytes());
        }
        for v in [1.0f64, 1.0, 0.0, 0.0, 0.0, 0.0, 1000.0, 2000.0, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        for key in PROJECTED_KEYS {
            bytes.extend_from_slice(&key.to_le_bytes());
        }
        assert_eq!(bytes.len(), data_at as usize);
        bytes.extend_from_slice(&tiles);

        let path = std::env::temp_dir().join(format!("landslide-raster-{}.tif", uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes).unwrap();
        TempTiff(path)
    }

    #[test]
    fn samples_values_from_tiles_including_edge_tiles() {
        let file = write_tiled_f32();
        let sampler = open(&file.0, None).unwrap();
        assert_eq!((sampler.dataset().width(), sampler.dataset().height()), (20, 20));

        let at = |row: u32, col: u32| {
            sampler
                .sample(&utm(1000.5 + f64::from(col), 1999.5 - f64::from(row)))
                .unwrap()
        };
        assert_eq!(at(0, 0), Some(0.0));
        assert_eq!(at(15, 15), Some(315.0));
        assert_eq!(at(5, 17), Some(117.0));
        assert_eq!(at(17, 3), Some(343.0));
        assert_eq!(at(18, 19), Some(379.0));
        assert_eq!(at(19, 19), Some(399.0));
    }

    #[test]
    fn edge_tile_offsets_follow_the_decoded_size() {
        let layout = ChunkLayout {
            chunk_width: 16,
            chunk_height: 16,
            chunks_across: 2,
        };
        assert_eq!(layout.chunk_index(19, 19), 3);
        assert_eq!(layout.chunk_index(17, 3), 2);
        // Padded to the full tile.
        assert_eq!(layout.locate(19, 19, 20, 20, 256), 3 * 16 + 3);
        // Cropped to the 4x4 of real data.
        assert_eq!(layout.locate(19, 19, 20, 20, 16), 3 * 4 + 3);
        assert_eq!(layout.locate(17, 3, 20, 20, 64), 16 + 3);
        // Interior tiles are full either way.
        assert_eq!(layout.locate(15, 15, 20, 20, 256), 15 * 16 + 15);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join(format!("landslide-raster-{}.tif", uuid::Uuid::new_v4()));
        assert!(matches!(open(&path, None), Err(RasterError::Io(_))));
    }

    #[test]
    fn parses_inline_geo_keys_only() {
        let directory: [u32; 16] = [1, 1, 0, 3, 1025, 0, 1, 1, 3072, 0, 1, 26914, 3073, 34737, 5, 0];
        assert_eq!(parse_geo_keys(&directory), vec![(1025, 1), (3072, 26914)]);
        assert!(parse_geo_keys(&[1, 1]).is_empty());
    }

    #[test]
    fn user_defined_crs_is_rejected() {
        assert!(crs_from_geo_keys(&[(3072, USER_DEFINED)]).is_err());
        assert_eq!(crs_from_geo_keys(&[(3072, 3083)]).unwrap(), Crs::Epsg(3083));
    }
}
