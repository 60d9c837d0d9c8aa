//! Web-Mercator tile addressing and Terrain-RGB decoding.
//!
//! Further reading: https://docs.mapbox.com/data/tilesets/reference/mapbox-terrain-rgb-v1/

use crate::error::Error;

use std::f64::consts::PI;
use std::fmt;

use image::ImageFormat;

/// A slippy map tile in XYZ format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

impl TileKey {
    pub fn new(zoom: u8, x: u32, y: u32) -> TileKey {
        TileKey { zoom, x, y }
    }
}

/// Deepest tile zoom the sampler will address.
pub const MAX_TILE_ZOOM: u8 = 24;

pub fn tiles_per_side(zoom: u8) -> u32 {
    1 << zoom
}

/// Tile zoom used for elevation lookups at a given (fractional) map zoom.
pub fn working_zoom(viewport_zoom: f64, zoom_offset: u8, max_zoom: u8) -> u8 {
    let max_zoom = max_zoom.min(MAX_TILE_ZOOM);
    let zoom = viewport_zoom.floor() + zoom_offset as f64;
    if zoom.is_nan() {
        return max_zoom;
    }

    zoom.clamp(0.0, max_zoom as f64) as u8
}

/// Projects a point to fractional tile coordinates at `zoom`. The integer part is the
/// tile index, the fractional part the position within that tile.
pub fn project(lng: f64, lat: f64, zoom: u8) -> (f64, f64) {
    let n = tiles_per_side(zoom) as f64;
    let lat_rad = lat.to_radians();

    let x = (lng + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;

    (x, y)
}

/// Inverse of [`project`].
pub fn unproject(x: f64, y: f64, zoom: u8) -> (f64, f64) {
    let n = tiles_per_side(zoom) as f64;

    let lng = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();

    (lng, lat)
}

/// The tile containing a point, clamped to the valid tile range at `zoom`.
pub fn tile_for(lng: f64, lat: f64, zoom: u8) -> TileKey {
    let (x, y) = slippy_map_tilenames::lonlat2tile(lng, lat, zoom);
    let max = tiles_per_side(zoom) - 1;

    TileKey::new(zoom, x.min(max), y.min(max))
}

/// Decodes a Terrain-RGB pixel to meters.
pub fn decode_elevation(r: u8, g: u8, b: u8) -> f64 {
    let value = (r as u32) * 65536 + (g as u32) * 256 + b as u32;
    -10000.0 + value as f64 * 0.1
}

/// A decoded square elevation tile holding raw RGBA pixels, row-major.
#[derive(Clone, Debug)]
pub struct ElevationTile {
    size: u32,
    rgba: Vec<u8>,
}

impl ElevationTile {
    /// Decodes a PNG tile, rejecting images that are not `expected_size` pixels square.
    pub fn from_png(key: TileKey, data: &[u8], expected_size: u32) -> Result<ElevationTile, Error> {
        let image = image::load_from_memory_with_format(data, ImageFormat::Png)?.to_rgba8();
        let (width, height) = image.dimensions();

        if width != expected_size || height != expected_size {
            return Err(Error::UnexpectedTileSize {
                key,
                width,
                height,
                expected: expected_size,
            });
        }

        Ok(ElevationTile {
            size: expected_size,
            rgba: image.into_raw(),
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Elevation in meters of the pixel at column `x`, row `y`.
    pub fn elevation(&self, x: u32, y: u32) -> Option<f64> {
        if x >= self.size || y >= self.size {
            return None;
        }

        let index = ((y as usize) * (self.size as usize) + x as usize) * 4;
        let pixel = self.rgba.get(index..index + 3)?;

        Some(decode_elevation(pixel[0], pixel[1], pixel[2]))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::io::Cursor;

    use assert_approx_eq::assert_approx_eq;
    use image::{DynamicImage, Rgba, RgbaImage};

    /// Encodes a Terrain-RGB pixel value for `meters`.
    pub(crate) fn encode_elevation(meters: f64) -> [u8; 3] {
        let value = ((meters + 10000.0) * 10.0).round() as u32;
        [(value >> 16) as u8, (value >> 8) as u8, value as u8]
    }

    /// Builds a PNG tile whose pixels are produced by `f(column, row)` in meters.
    pub(crate) fn png_tile<F: Fn(u32, u32) -> f64>(size: u32, f: F) -> Vec<u8> {
        let image = RgbaImage::from_fn(size, size, |x, y| {
            let [r, g, b] = encode_elevation(f(x, y));
            Rgba([r, g, b, 255])
        });

        let mut data = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .expect("Unable to encode test tile");
        data
    }

    #[test]
    fn test_decode_known_triples() {
        assert_approx_eq!(-10000.0, decode_elevation(0, 0, 0));
        assert_approx_eq!(0.0, decode_elevation(1, 134, 160));
        assert_approx_eq!(1667721.5, decode_elevation(255, 255, 255), 1e-6);
        assert_approx_eq!(-9999.9, decode_elevation(0, 0, 1), 1e-9);
    }

    #[test]
    fn test_working_zoom() {
        assert_eq!(10, working_zoom(8.7, 2, 12));
        assert_eq!(12, working_zoom(10.0, 2, 12));
        assert_eq!(12, working_zoom(15.3, 2, 12));
        assert_eq!(0, working_zoom(-4.0, 2, 12));
        assert_eq!(MAX_TILE_ZOOM, working_zoom(39.0, 2, 40));
    }

    #[test]
    fn test_projection_round_trip() {
        let zoom = 10;
        for &(lng, lat) in &[(11.3, 46.5), (-122.42, 37.77), (0.0, 0.0), (151.2, -33.87)] {
            let (x, y) = project(lng, lat, zoom);
            let (back_lng, back_lat) = unproject(x, y, zoom);

            // One 512px pixel at zoom 10 spans well under 1e-3 degrees
            assert_approx_eq!(lng, back_lng, 1e-9);
            assert_approx_eq!(lat, back_lat, 1e-9);

            let key = tile_for(lng, lat, zoom);
            assert_eq!((x.floor() as u32, y.floor() as u32), (key.x, key.y));
            let (west, north) = unproject(key.x as f64, key.y as f64, zoom);
            assert!(west <= lng && north >= lat);
        }
    }

    #[test]
    fn test_tile_for_clamps_to_pyramid() {
        assert_eq!(TileKey::new(2, 0, 0), tile_for(-180.0, 89.9, 2));
        assert_eq!(TileKey::new(2, 3, 3), tile_for(180.0, -89.9, 2));
        assert_eq!(TileKey::new(2, 0, 3), tile_for(-200.0, -89.9, 2));
    }

    #[test]
    fn test_decode_png_tile() {
        let data = png_tile(4, |x, y| (x * 10 + y) as f64);
        let tile = ElevationTile::from_png(TileKey::new(0, 0, 0), &data, 4).unwrap();

        assert_approx_eq!(0.0, tile.elevation(0, 0).unwrap(), 1e-6);
        assert_approx_eq!(32.0, tile.elevation(3, 2).unwrap(), 1e-6);
        assert_eq!(None, tile.elevation(4, 0));
    }

    #[test]
    fn test_reject_wrong_tile_size() {
        let data = png_tile(4, |_, _| 100.0);
        match ElevationTile::from_png(TileKey::new(0, 0, 0), &data, 8) {
            Err(Error::UnexpectedTileSize { width, .. }) => assert_eq!(4, width),
            other => panic!("Unexpected result {:?}", other.map(|t| t.size())),
        }
    }
}
