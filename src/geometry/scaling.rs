use super::Projector;
use super::projection::MAX_LATITUDE;
use crate::domain::Coordinate;

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Create bounds from a set of points
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self {
            south: first.latitude,
            west: first.longitude,
            north: first.latitude,
            east: first.longitude,
        };
        bounds.expand(&points[1..]);
        Some(bounds)
    }

    /// Expand bounds to include another set of points
    pub fn expand(&mut self, points: &[Coordinate]) {
        for p in points {
            self.south = self.south.min(p.latitude);
            self.north = self.north.max(p.latitude);
            self.west = self.west.min(p.longitude);
            self.east = self.east.max(p.longitude);
        }
    }

    /// Whether `point` lies inside the box
    ///
    /// Latitudes are compared after clamping to the Web Mercator limit, so a
    /// point drawn pinned to the map's top or bottom edge counts as inside.
    pub fn contains(&self, point: &Coordinate) -> bool {
        let clamp = |lat: f64| lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        (clamp(self.south)..=clamp(self.north)).contains(&clamp(point.latitude))
            && (self.west..=self.east).contains(&point.longitude)
    }

    pub fn north_west(&self) -> Coordinate {
        Coordinate::new(self.north, self.west)
    }

    pub fn south_east(&self) -> Coordinate {
        Coordinate::new(self.south, self.east)
    }
}

/// Map view: center point, integer zoom and the geographic area it shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Coordinate,
    pub zoom: u8,
    pub bounds: Bounds,
}

impl Viewport {
    /// Viewport of `width` x `height` pixels centered on `center`
    pub fn centered(center: Coordinate, zoom: u8, width: u32, height: u32) -> Self {
        let proj = Projector::new(zoom as f64);
        let (cx, cy) = proj.project(&center);
        let half_w = width as f64 / 2.0;
        let half_h = height as f64 / 2.0;
        let nw = proj.unproject(cx - half_w, cy - half_h);
        let se = proj.unproject(cx + half_w, cy + half_h);

        Self {
            center,
            zoom,
            bounds: Bounds {
                south: se.latitude,
                west: nw.longitude,
                north: nw.latitude,
                east: se.longitude,
            },
        }
    }

    /// Largest zoom at which `bounds` fits inside the padded viewport
    ///
    /// # Arguments
    /// * `bounds` - Area that must stay visible
    /// * `width`, `height` - Viewport size in pixels
    /// * `padding` - Pixels kept clear on every edge
    /// * `max_zoom` - Upper zoom clamp (used when all points coincide)
    pub fn fit(bounds: &Bounds, width: u32, height: u32, padding: u32, max_zoom: u8) -> Self {
        let usable_w = (width as f64 - 2.0 * padding as f64).max(1.0);
        let usable_h = (height as f64 - 2.0 * padding as f64).max(1.0);

        // Measure the box at zoom 0 and scale up by powers of two
        let proj = Projector::new(0.0);
        let (x0, y0) = proj.project(&bounds.north_west());
        let (x1, y1) = proj.project(&bounds.south_east());
        let box_w = (x1 - x0).abs();
        let box_h = (y1 - y0).abs();

        let scale = match (box_w > 0.0, box_h > 0.0) {
            (true, true) => (usable_w / box_w).min(usable_h / box_h),
            (true, false) => usable_w / box_w,
            (false, true) => usable_h / box_h,
            (false, false) => f64::INFINITY,
        };

        let zoom = if scale.is_finite() {
            scale.log2().floor().clamp(0.0, max_zoom as f64) as u8
        } else {
            max_zoom
        };

        let center = proj.unproject((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        Self::centered(center, zoom, width, height)
    }
}
