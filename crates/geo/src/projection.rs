//! Web Mercator projection and viewport mapping.
//!
//! World pixel space at zoom `z` is a square of `256 · 2^z` pixels with the
//! origin at the north-west corner (lng -180, lat ~85.05). Screen space is the
//! presentation layer's viewport: `(0, 0)` is its top-left corner and the map
//! center sits at `(width / 2, height / 2)` before panning.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::GeoPoint;

/// Edge length of a raster tile in pixels.
pub const TILE_SIZE: f64 = 256.0;

/// Lowest zoom level a viewport may use.
pub const MIN_ZOOM: u8 = 3;

/// Highest zoom level a viewport may use.
pub const MAX_ZOOM: u8 = 18;

/// Latitude where the Mercator square ends.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Kilometre scale used for the radius-to-pixel conversion.
const PIXEL_SCALE_KM: f64 = 80075.0;

/// A tile index in the Web Mercator raster grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub x: i64,
    pub y: i64,
    pub z: u8,
}

/// A point in world-pixel or screen space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[inline]
fn world_tiles(zoom: u8) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// Normalised Mercator coordinates in `[0, 1]` for a point.
#[inline]
fn mercator_unit(lat: f64, lng: f64) -> (f64, f64) {
    let lat_rad = lat.to_radians();
    let x = (lng + 180.0) / 360.0;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
    (x, y)
}

/// Clamps a latitude to the range the Mercator square can represent.
#[inline]
pub fn clamp_latitude(lat: f64) -> f64 {
    lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT)
}

/// Tile containing a point at the given zoom level.
///
/// Latitudes close to the poles produce out-of-range indices; clamp them
/// with [`clamp_latitude`] first.
///
/// # Example
/// ```
/// use uavo_geo::to_tile;
///
/// let tile = to_tile(53.0, 23.5, 8);
/// assert_eq!((tile.x, tile.y, tile.z), (144, 83, 8));
/// ```
pub fn to_tile(lat: f64, lng: f64, zoom: u8) -> Tile {
    let n = world_tiles(zoom);
    let (x, y) = mercator_unit(lat, lng);
    Tile {
        x: (x * n).floor() as i64,
        y: (y * n).floor() as i64,
        z: zoom,
    }
}

/// World-pixel position of a point at the given zoom level.
pub fn to_world_pixel(lat: f64, lng: f64, zoom: u8) -> PixelPoint {
    let size = world_tiles(zoom) * TILE_SIZE;
    let (x, y) = mercator_unit(lat, lng);
    PixelPoint::new(x * size, y * size)
}

/// Inverse of [`to_world_pixel`].
///
/// # Example
/// ```
/// use uavo_geo::{to_lat_lng, to_world_pixel};
///
/// let px = to_world_pixel(53.0, 23.5, 8);
/// let point = to_lat_lng(px.x, px.y, 8);
/// assert!((point.lat - 53.0).abs() < 1e-9);
/// assert!((point.lng - 23.5).abs() < 1e-9);
/// ```
pub fn to_lat_lng(pixel_x: f64, pixel_y: f64, zoom: u8) -> GeoPoint {
    let size = world_tiles(zoom) * TILE_SIZE;
    let lng = pixel_x / size * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * pixel_y / size)).sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
}

/// Converts a ground radius into screen pixels at a latitude and zoom.
///
/// Mercator stretches distances away from the equator, so the pixel size of a
/// kilometre grows with `1 / cos(lat)`. Non-finite or non-positive radii give 0.
pub fn radius_to_pixels(radius_km: f64, center_lat: f64, zoom: u8) -> f64 {
    if !radius_km.is_finite() || radius_km <= 0.0 || !center_lat.is_finite() {
        return 0.0;
    }
    let km_per_pixel = PIXEL_SCALE_KM / 2f64.powi(i32::from(zoom) + 8);
    let scale = km_per_pixel * center_lat.to_radians().cos();
    if scale <= 0.0 {
        return 0.0;
    }
    radius_km / scale
}

/// Immutable viewport state owned by the presentation layer.
///
/// `pan_offset_*` shift the visible window in world pixels: a positive X pan
/// moves the window east, so markers move left on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: u8,
    pub width_px: f64,
    pub height_px: f64,
    #[serde(default)]
    pub pan_offset_x: f64,
    #[serde(default)]
    pub pan_offset_y: f64,
}

impl Viewport {
    /// Creates an unpanned viewport, clamping zoom to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn new(center: GeoPoint, zoom: u8, width_px: f64, height_px: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width_px,
            height_px,
            pan_offset_x: 0.0,
            pan_offset_y: 0.0,
        }
    }

    /// Returns a copy with the given pan offset.
    pub fn with_pan(self, pan_offset_x: f64, pan_offset_y: f64) -> Self {
        Self {
            pan_offset_x,
            pan_offset_y,
            ..self
        }
    }

    /// Returns a copy at another zoom level, clamped like [`Viewport::new`].
    pub fn with_zoom(self, zoom: u8) -> Self {
        Self {
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            ..self
        }
    }

    /// True when every field is finite, the zoom is within
    /// `[MIN_ZOOM, MAX_ZOOM]` and the viewport has an area.
    pub fn is_valid(&self) -> bool {
        (MIN_ZOOM..=MAX_ZOOM).contains(&self.zoom)
            && self.center.is_valid()
            && self.width_px.is_finite()
            && self.height_px.is_finite()
            && self.width_px > 0.0
            && self.height_px > 0.0
            && self.pan_offset_x.is_finite()
            && self.pan_offset_y.is_finite()
    }

    /// World pixel under the top-left corner of the screen.
    fn origin(&self) -> PixelPoint {
        let center = to_world_pixel(self.center.lat, self.center.lng, self.zoom);
        PixelPoint::new(
            center.x - self.width_px / 2.0 + self.pan_offset_x,
            center.y - self.height_px / 2.0 + self.pan_offset_y,
        )
    }

    /// Tiles whose footprint intersects the viewport.
    ///
    /// Indices outside `[0, 2^zoom - 1]` do not exist and are dropped rather
    /// than wrapped. An invalid viewport yields no tiles.
    pub fn visible_tiles(&self) -> Vec<Tile> {
        if !self.is_valid() {
            tracing::debug!(viewport = ?self, "invalid viewport, no tiles");
            return Vec::new();
        }

        let origin = self.origin();
        let min_x = (origin.x / TILE_SIZE).floor() as i64;
        let max_x = ((origin.x + self.width_px) / TILE_SIZE).floor() as i64;
        let min_y = (origin.y / TILE_SIZE).floor() as i64;
        let max_y = ((origin.y + self.height_px) / TILE_SIZE).floor() as i64;

        let max_tile = (1i64 << self.zoom) - 1;
        let (min_x, max_x) = (min_x.max(0), max_x.min(max_tile));
        let (min_y, max_y) = (min_y.max(0), max_y.min(max_tile));

        let mut tiles = Vec::new();
        for x in min_x..=max_x {
            for y in min_y..=max_y {
                tiles.push(Tile { x, y, z: self.zoom });
            }
        }
        tiles
    }

    /// Screen position of a tile's top-left corner.
    ///
    /// The tile is placed using its own zoom level, so tiles from a previous
    /// zoom can still be positioned while a new level loads.
    pub fn tile_screen_position(&self, tile: &Tile) -> PixelPoint {
        let center = to_world_pixel(self.center.lat, self.center.lng, tile.z);
        PixelPoint::new(
            tile.x as f64 * TILE_SIZE - center.x + self.width_px / 2.0 - self.pan_offset_x,
            tile.y as f64 * TILE_SIZE - center.y + self.height_px / 2.0 - self.pan_offset_y,
        )
    }

    /// Screen position of an arbitrary point (detection, incident, shelter).
    ///
    /// # Example
    /// ```
    /// use uavo_geo::{GeoPoint, Viewport};
    ///
    /// let center = GeoPoint::new(53.0, 23.5);
    /// let viewport = Viewport::new(center, 8, 800.0, 600.0);
    /// let px = viewport.marker_screen_position(&center);
    /// assert!((px.x - 400.0).abs() < 1e-9 && (px.y - 300.0).abs() < 1e-9);
    /// ```
    pub fn marker_screen_position(&self, point: &GeoPoint) -> PixelPoint {
        let marker = to_world_pixel(point.lat, point.lng, self.zoom);
        let center = to_world_pixel(self.center.lat, self.center.lng, self.zoom);
        PixelPoint::new(
            marker.x - center.x + self.width_px / 2.0 - self.pan_offset_x,
            marker.y - center.y + self.height_px / 2.0 - self.pan_offset_y,
        )
    }

    /// Geographic point under a screen position; inverse of
    /// [`Viewport::marker_screen_position`].
    pub fn screen_to_lat_lng(&self, click_x: f64, click_y: f64) -> GeoPoint {
        if click_x == self.width_px / 2.0
            && click_y == self.height_px / 2.0
            && self.pan_offset_x == 0.0
            && self.pan_offset_y == 0.0
        {
            return self.center;
        }

        let center = to_world_pixel(self.center.lat, self.center.lng, self.zoom);
        let world_x = center.x + (click_x - self.width_px / 2.0) + self.pan_offset_x;
        let world_y = center.y + (click_y - self.height_px / 2.0) + self.pan_offset_y;
        to_lat_lng(world_x, world_y, self.zoom)
    }
}
