//! Map surface: one map instance, a center marker and the current spot markers.

pub mod geojson;
pub mod scene;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Availability, Coordinate, ParkingSpot};
use crate::geometry::Viewport;

pub use scene::{Marker, Scene};

pub const DEFAULT_ZOOM: u8 = 13;
pub const DEFAULT_PADDING: u32 = 50;
pub const DEFAULT_ICON_TEMPLATE: &str =
    "https://raw.githubusercontent.com/pointhi/leaflet-color-markers/master/img/marker-icon-2x-{color}.png";
pub const DEFAULT_SHADOW_URL: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet/0.7.7/images/marker-shadow.png";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("map has not been initialized")]
    NotInitialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MarkerId(pub u64);

/// Visual category of a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerStyle {
    Center,
    Spot(Availability),
}

impl MarkerStyle {
    pub fn color(self) -> &'static str {
        match self {
            MarkerStyle::Center => "blue",
            MarkerStyle::Spot(a) => a.color(),
        }
    }

    /// Fill color matching the leaflet-color-markers artwork
    pub fn hex(self) -> &'static str {
        match self {
            MarkerStyle::Center => "#2a81cb",
            MarkerStyle::Spot(Availability::Plentiful) => "#2aad27",
            MarkerStyle::Spot(Availability::Limited) => "#ffd326",
            MarkerStyle::Spot(Availability::Full) => "#cb2b3e",
        }
    }
}

/// Marker icon URLs
#[derive(Debug, Clone)]
pub struct IconSet {
    /// URL with a `{color}` placeholder
    pub template: String,
    pub shadow_url: String,
}

impl Default for IconSet {
    fn default() -> Self {
        Self {
            template: DEFAULT_ICON_TEMPLATE.to_string(),
            shadow_url: DEFAULT_SHADOW_URL.to_string(),
        }
    }
}

impl IconSet {
    pub fn icon_url(&self, style: MarkerStyle) -> String {
        self.template.replace("{color}", style.color())
    }
}

/// Read-only info panel attached to a spot marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotPopup {
    pub name: String,
    pub available: u32,
    pub hourly_rate: f64,
    pub status: &'static str,
    pub category: Availability,
}

impl SpotPopup {
    pub fn from_spot(spot: &ParkingSpot) -> Self {
        Self {
            name: spot.name.clone(),
            available: spot.available,
            hourly_rate: spot.hourly_rate,
            status: spot.status_label(),
            category: spot.availability(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Popup {
    /// Center marker caption
    Label(String),
    Spot(SpotPopup),
}

impl Popup {
    /// Info window markup, with `currency` prefixed to the rate
    pub fn to_html(&self, currency: &str) -> String {
        match self {
            Popup::Label(text) => format!("<b>{}</b>", escape_html(text)),
            Popup::Spot(p) => format!(
                concat!(
                    "<div class=\"info-window-content\">",
                    "<h3 style=\"margin:0; color:#333;\">{}</h3><hr>",
                    "<p><b>Available:</b> {} spots</p>",
                    "<p><b>Rate:</b> {}{}/hr</p>",
                    "<p><b>Status:</b> {}</p>",
                    "</div>"
                ),
                escape_html(&p.name),
                p.available,
                currency,
                format_rate(p.hourly_rate),
                p.status
            ),
        }
    }
}

impl std::fmt::Display for Popup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Popup::Label(text) => write!(f, "{}", text),
            Popup::Spot(p) => write!(
                f,
                "{} | available: {} | rate: {}/hr | {}",
                p.name,
                p.available,
                format_rate(p.hourly_rate),
                p.status
            ),
        }
    }
}

/// Whole rates print without decimals, fractional ones with two
pub fn format_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{:.0}", rate)
    } else {
        format!("{:.2}", rate)
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The mapping-widget contract
pub trait MapBackend {
    /// Build a fresh map centered on `center`
    fn create(&mut self, center: Coordinate, zoom: u8);

    /// Drop the map and every marker on it; no-op without a map
    fn destroy(&mut self);

    fn add_marker(&mut self, position: Coordinate, style: MarkerStyle, popup: Popup) -> MarkerId;

    fn remove_marker(&mut self, id: MarkerId);

    /// Move the view so every point is visible with `padding` pixels to spare
    fn fit_bounds(&mut self, points: &[Coordinate], padding: u32);

    fn viewport(&self) -> Option<Viewport>;
}

/// Owns one map instance and tracks which markers belong to the spot layer
pub struct MapView<B: MapBackend> {
    backend: B,
    zoom: u8,
    padding: u32,
    center: Option<(Coordinate, MarkerId)>,
    spot_markers: Vec<MarkerId>,
}

impl<B: MapBackend> MapView<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            zoom: DEFAULT_ZOOM,
            padding: DEFAULT_PADDING,
            center: None,
            spot_markers: Vec::new(),
        }
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Replace any existing map with a fresh one centered on `center`
    pub fn initialize(&mut self, center: Coordinate, label_text: &str) {
        self.teardown();

        self.backend.create(center, self.zoom);
        let id = self.backend.add_marker(
            center,
            MarkerStyle::Center,
            Popup::Label(label_text.to_string()),
        );
        self.center = Some((center, id));
        debug!(%center, zoom = self.zoom, "map initialized");
    }

    /// Swap the spot layer for `spots` and refit the view
    ///
    /// # Returns
    /// * Number of spot markers now shown
    pub fn replace_markers(&mut self, spots: &[ParkingSpot]) -> Result<usize, MapError> {
        let (center, _) = self.center.ok_or(MapError::NotInitialized)?;

        for id in self.spot_markers.drain(..) {
            self.backend.remove_marker(id);
        }

        for spot in spots {
            let id = self.backend.add_marker(
                spot.coordinate,
                MarkerStyle::Spot(spot.availability()),
                Popup::Spot(SpotPopup::from_spot(spot)),
            );
            self.spot_markers.push(id);
        }

        if !spots.is_empty() {
            let mut points = Vec::with_capacity(spots.len() + 1);
            points.push(center);
            points.extend(spots.iter().map(|s| s.coordinate));
            self.backend.fit_bounds(&points, self.padding);
        }

        Ok(self.spot_markers.len())
    }

    /// Destroy the map; safe to call when there is none
    pub fn teardown(&mut self) {
        if self.center.take().is_some() {
            debug!("map torn down");
        }
        self.spot_markers.clear();
        self.backend.destroy();
    }

    pub fn is_initialized(&self) -> bool {
        self.center.is_some()
    }

    pub fn center(&self) -> Option<Coordinate> {
        self.center.map(|(c, _)| c)
    }

    pub fn spot_marker_count(&self) -> usize {
        self.spot_markers.len()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.backend.viewport()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
