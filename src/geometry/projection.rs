use crate::domain::Coordinate;

/// Tile edge length in pixels for the standard slippy-map tiling
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the Web Mercator square
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Spherical Web Mercator projection (EPSG:3857) into pixel space
///
/// Pixel space at zoom `z` is a square of `256 * 2^z` pixels with the origin
/// at the north-west corner, matching how slippy-map widgets lay out tiles.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    world_size: f64,
}

impl Projector {
    /// Create a projector for the given (possibly fractional) zoom level
    pub fn new(zoom: f64) -> Self {
        Self {
            world_size: TILE_SIZE * 2f64.powf(zoom),
        }
    }

    /// Project a coordinate to (x, y) pixels
    pub fn project(&self, coord: &Coordinate) -> (f64, f64) {
        let lat = coord.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (coord.longitude + 180.0) / 360.0 * self.world_size;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0
            * self.world_size;
        (x, y)
    }

    /// Inverse of [`Projector::project`]
    pub fn unproject(&self, x: f64, y: f64) -> Coordinate {
        let longitude = x / self.world_size * 360.0 - 180.0;
        let n = std::f64::consts::PI * (1.0 - 2.0 * y / self.world_size);
        let latitude = n.sinh().atan().to_degrees();
        Coordinate::new(latitude, longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_is_world_center() {
        let proj = Projector::new(0.0);
        let (x, y) = proj.project(&Coordinate::new(0.0, 0.0));
        assert!((x - 128.0).abs() < 1e-9);
        assert!((y - 128.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_guwahati() {
        let proj = Projector::new(13.0);
        let c = Coordinate::new(26.14, 91.64);
        let (x, y) = proj.project(&c);
        let back = proj.unproject(x, y);
        assert!((back.latitude - c.latitude).abs() < 1e-9);
        assert!((back.longitude - c.longitude).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_doubles_pixels() {
        let c = Coordinate::new(40.0, -74.0);
        let (x1, _) = Projector::new(5.0).project(&c);
        let (x2, _) = Projector::new(6.0).project(&c);
        assert!((x2 - 2.0 * x1).abs() < 1e-6);
    }
}
