use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use super::{MapBackend, MarkerId, MarkerStyle, Popup};
use crate::domain::Coordinate;
use crate::geometry::{Bounds, Viewport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: MarkerId,
    pub position: Coordinate,
    pub style: MarkerStyle,
    pub popup: Popup,
}

#[derive(Debug)]
struct Live {
    viewport: Viewport,
    markers: BTreeMap<MarkerId, Marker>,
}

/// In-memory map backend
///
/// Keeps markers and the current viewport of a `width` x `height` pixel
/// map so the result can be inspected or exported.
#[derive(Debug)]
pub struct Scene {
    width: u32,
    height: u32,
    max_zoom: u8,
    next_id: u64,
    live: Option<Live>,
}

impl Scene {
    pub fn new(width: u32, height: u32, max_zoom: u8) -> Self {
        Self {
            width,
            height,
            max_zoom,
            next_id: 0,
            live: None,
        }
    }

    /// Markers in insertion order; empty without a map
    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.live.iter().flat_map(|live| live.markers.values())
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }
}

impl MapBackend for Scene {
    fn create(&mut self, center: Coordinate, zoom: u8) {
        let zoom = zoom.min(self.max_zoom);
        self.live = Some(Live {
            viewport: Viewport::centered(center, zoom, self.width, self.height),
            markers: BTreeMap::new(),
        });
    }

    fn destroy(&mut self) {
        self.live = None;
    }

    fn add_marker(&mut self, position: Coordinate, style: MarkerStyle, popup: Popup) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;

        match self.live.as_mut() {
            Some(live) => {
                live.markers.insert(
                    id,
                    Marker {
                        id,
                        position,
                        style,
                        popup,
                    },
                );
            }
            None => trace!(?id, "marker added without a map, dropped"),
        }
        id
    }

    fn remove_marker(&mut self, id: MarkerId) {
        if let Some(live) = self.live.as_mut() {
            live.markers.remove(&id);
        }
    }

    fn fit_bounds(&mut self, points: &[Coordinate], padding: u32) {
        let (Some(live), Some(bounds)) = (self.live.as_mut(), Bounds::from_points(points)) else {
            return;
        };
        live.viewport = Viewport::fit(&bounds, self.width, self.height, padding, self.max_zoom);
    }

    fn viewport(&self) -> Option<Viewport> {
        self.live.as_ref().map(|live| live.viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_centers_viewport() {
        let mut scene = Scene::new(800, 600, 18);
        let c = Coordinate::new(26.14, 91.64);
        scene.create(c, 13);

        let vp = scene.viewport().unwrap();
        assert_eq!(vp.center, c);
        assert_eq!(vp.zoom, 13);
        assert!(vp.bounds.contains(&c));
    }

    #[test]
    fn test_zoom_clamped_to_max() {
        let mut scene = Scene::new(800, 600, 10);
        scene.create(Coordinate::new(0.0, 0.0), 15);
        assert_eq!(scene.viewport().unwrap().zoom, 10);
    }

    #[test]
    fn test_destroy_drops_markers() {
        let mut scene = Scene::new(800, 600, 18);
        scene.create(Coordinate::new(0.0, 0.0), 13);
        scene.add_marker(
            Coordinate::new(0.0, 0.0),
            MarkerStyle::Center,
            Popup::Label("x".to_string()),
        );
        assert_eq!(scene.markers().count(), 1);

        scene.destroy();
        assert!(!scene.is_live());
        assert_eq!(scene.markers().count(), 0);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut scene = Scene::new(800, 600, 18);
        scene.create(Coordinate::new(0.0, 0.0), 13);
        let origin = Coordinate::new(0.0, 0.0);
        let a = scene.add_marker(origin, MarkerStyle::Center, Popup::Label("a".into()));
        scene.remove_marker(a);
        let b = scene.add_marker(origin, MarkerStyle::Center, Popup::Label("b".into()));
        assert_ne!(a, b);
    }
}
