use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{IconSet, MapBackend, Marker, Popup, Scene};

/// Build a GeoJSON FeatureCollection of every marker in the scene
///
/// Features carry simplestyle `marker-color` so generic viewers color them,
/// plus the icon URLs and popup markup a Leaflet page can use directly.
/// The collection's `bbox` is the current viewport.
pub fn scene_to_geojson(
    scene: &Scene,
    icons: &IconSet,
    currency: &str,
    refreshed_at: Option<&str>,
) -> Value {
    let features: Vec<Value> = scene
        .markers()
        .map(|m| marker_feature(m, icons, currency))
        .collect();

    let mut collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });

    if let Some(vp) = scene.viewport() {
        collection["bbox"] = json!([
            vp.bounds.west,
            vp.bounds.south,
            vp.bounds.east,
            vp.bounds.north
        ]);
        collection["viewport"] = json!({
            "center": [vp.center.longitude, vp.center.latitude],
            "zoom": vp.zoom,
        });
    }
    if let Some(at) = refreshed_at {
        collection["refreshed_at"] = json!(at);
    }

    collection
}

fn marker_feature(marker: &Marker, icons: &IconSet, currency: &str) -> Value {
    let mut properties = json!({
        "marker-color": marker.style.hex(),
        "icon_url": icons.icon_url(marker.style),
        "shadow_url": icons.shadow_url,
        "popup_html": marker.popup.to_html(currency),
    });

    match &marker.popup {
        Popup::Label(text) => {
            properties["role"] = json!("center");
            properties["title"] = json!(text);
        }
        Popup::Spot(p) => {
            properties["role"] = json!("spot");
            properties["title"] = json!(p.name);
            properties["available"] = json!(p.available);
            properties["hourly_rate"] = json!(p.hourly_rate);
            properties["status"] = json!(p.status);
            properties["category"] = json!(p.category.label());
        }
    }

    json!({
        "type": "Feature",
        "id": marker.id.0,
        "geometry": {
            "type": "Point",
            "coordinates": [marker.position.longitude, marker.position.latitude],
        },
        "properties": properties,
    })
}

/// Write the scene to `path`, replacing the previous snapshot in one step
///
/// The document goes to a sibling temp file first and is then renamed, so
/// a viewer polling the file never sees a half-written snapshot.
pub fn write_snapshot(
    path: &Path,
    scene: &Scene,
    icons: &IconSet,
    currency: &str,
    refreshed_at: Option<&str>,
) -> Result<()> {
    let doc = scene_to_geojson(scene, icons, currency, refreshed_at);

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    let file = File::create(tmp)
        .with_context(|| format!("Failed to create snapshot file: {}", tmp.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &doc).context("Failed to serialize snapshot")?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    drop(writer);

    fs::rename(tmp, path)
        .with_context(|| format!("Failed to move snapshot into place: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinate, ParkingSpot};
    use crate::map::MapView;
    use tempfile::tempdir;

    fn populated_view() -> MapView<Scene> {
        let mut view = MapView::new(Scene::new(800, 600, 18));
        view.initialize(Coordinate::new(26.14, 91.64), "You are here");
        view.replace_markers(&[
            ParkingSpot::new("A", Coordinate::new(10.0, 20.0), 0, 30.0),
            ParkingSpot::new("B", Coordinate::new(26.2, 91.7), 15, 20.0),
        ])
        .unwrap();
        view
    }

    #[test]
    fn test_feature_collection() {
        let view = populated_view();
        let doc = scene_to_geojson(view.backend(), &IconSet::default(), "₹", Some("10:00:00"));

        let features = doc["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["properties"]["role"], "center");
        assert_eq!(features[0]["properties"]["title"], "You are here");

        let full = &features[1];
        assert_eq!(full["geometry"]["coordinates"], json!([20.0, 10.0]));
        assert_eq!(full["properties"]["category"], "full");
        assert_eq!(full["properties"]["available"], 0);
        assert_eq!(full["properties"]["hourly_rate"], 30.0);
        assert_eq!(full["properties"]["marker-color"], "#cb2b3e");
        assert!(
            full["properties"]["icon_url"]
                .as_str()
                .unwrap()
                .ends_with("marker-icon-2x-red.png")
        );

        assert_eq!(doc["bbox"].as_array().unwrap().len(), 4);
        assert_eq!(doc["refreshed_at"], "10:00:00");
    }

    #[test]
    fn test_write_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spots.geojson");
        let view = populated_view();

        write_snapshot(&path, view.backend(), &IconSet::default(), "₹", None).unwrap();
        // Second write must replace, not append
        write_snapshot(&path, view.backend(), &IconSet::default(), "₹", None).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let doc: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(doc["type"], "FeatureCollection");
        assert_eq!(doc["features"].as_array().unwrap().len(), 3);
        assert!(!dir.path().join("spots.geojson.tmp").exists());
    }
}
