use serde::Deserialize;
use serde_json::{Map, Value};

use super::FeedError;
use crate::domain::{Coordinate, ParkingSpot};

const UNNAMED_SPOT: &str = "Unnamed spot";

/// Key names tried, in order, for each spot field
///
/// The prediction service has used several spellings for the same field,
/// so every field is looked up through a list of candidates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldAliases {
    pub latitude: Vec<String>,
    pub longitude: Vec<String>,
    pub available: Vec<String>,
    pub name: Vec<String>,
    pub hourly_rate: Vec<String>,
    pub distance_km: Vec<String>,
    pub total_capacity: Vec<String>,
    pub predicted_occupied: Vec<String>,
    pub status_color: Vec<String>,
    pub city: Vec<String>,
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            latitude: keys(&["latitude", "lat"]),
            longitude: keys(&["longitude", "lng", "lon"]),
            available: keys(&["available", "available_count"]),
            name: keys(&["location_name", "name"]),
            hourly_rate: keys(&["hourly_rate"]),
            distance_km: keys(&["distance_km"]),
            total_capacity: keys(&["total_capacity"]),
            predicted_occupied: keys(&["predicted_occupied"]),
            status_color: keys(&["status_color"]),
            city: keys(&["city"]),
        }
    }
}

/// Parse a raw response body into parking spots
pub fn parse_response(
    body: &str,
    aliases: &FieldAliases,
) -> Result<Vec<ParkingSpot>, FeedError> {
    let value: Value = serde_json::from_str(body)?;
    parse_value(&value, aliases)
}

/// Parse a decoded response into parking spots
///
/// # Accepted shapes
/// * `{"predictions": [...]}` - wrapper object
/// * `[...]` - bare list
///
/// Entries without a usable coordinate pair are skipped.
pub fn parse_value(value: &Value, aliases: &FieldAliases) -> Result<Vec<ParkingSpot>, FeedError> {
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("predictions") {
            Some(Value::Array(items)) => items,
            _ => return Err(FeedError::UnexpectedShape),
        },
        _ => return Err(FeedError::UnexpectedShape),
    };

    let spots: Vec<ParkingSpot> = entries
        .iter()
        .filter_map(|entry| entry.as_object())
        .filter_map(|entry| parse_spot(entry, aliases))
        .collect();

    let skipped = entries.len() - spots.len();
    if skipped > 0 {
        tracing::debug!(skipped, "ignored entries without usable coordinates");
    }

    Ok(spots)
}

fn parse_spot(entry: &Map<String, Value>, aliases: &FieldAliases) -> Option<ParkingSpot> {
    let latitude = number(entry, &aliases.latitude)?;
    let longitude = number(entry, &aliases.longitude)?;
    let coordinate = Coordinate::new(latitude, longitude);
    if !coordinate.is_valid() {
        return None;
    }

    let name = text(entry, &aliases.name).unwrap_or_else(|| UNNAMED_SPOT.to_string());
    let available = count(entry, &aliases.available).unwrap_or(0);
    let hourly_rate = number(entry, &aliases.hourly_rate).unwrap_or(0.0);

    Some(ParkingSpot {
        name,
        coordinate,
        available,
        hourly_rate,
        distance_km: number(entry, &aliases.distance_km),
        total_capacity: count(entry, &aliases.total_capacity),
        predicted_occupied: count(entry, &aliases.predicted_occupied),
        status_color: text(entry, &aliases.status_color),
        city: text(entry, &aliases.city),
    })
}

/// First candidate key holding a number or a numeric string
fn number(entry: &Map<String, Value>, candidates: &[String]) -> Option<f64> {
    candidates
        .iter()
        .find_map(|key| match entry.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|n| n.is_finite())
}

/// Non-negative whole count; negatives clamp to zero
fn count(entry: &Map<String, Value>, candidates: &[String]) -> Option<u32> {
    number(entry, candidates).map(|n| n.max(0.0).round().min(u32::MAX as f64) as u32)
}

fn text(entry: &Map<String, Value>, candidates: &[String]) -> Option<String> {
    candidates.iter().find_map(|key| match entry.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
