use serde::Serialize;

use super::Coordinate;

/// Availability category derived from the number of free spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Plentiful,
    Limited,
    Full,
}

impl Availability {
    /// Classify a free-space count. More than 10 is plentiful, 1 to 10 is limited.
    pub fn from_available(available: u32) -> Availability {
        match available {
            0 => Availability::Full,
            1..=10 => Availability::Limited,
            _ => Availability::Plentiful,
        }
    }

    /// Marker color name used by the leaflet-color-markers icon set
    pub fn color(self) -> &'static str {
        match self {
            Availability::Plentiful => "green",
            Availability::Limited => "gold",
            Availability::Full => "red",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Availability::Plentiful => "plentiful",
            Availability::Limited => "limited",
            Availability::Full => "full",
        }
    }
}

/// One parking location as reported by the prediction feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParkingSpot {
    pub name: String,
    pub coordinate: Coordinate,
    pub available: u32,
    pub hourly_rate: f64,
    pub distance_km: Option<f64>,
    pub total_capacity: Option<u32>,
    pub predicted_occupied: Option<u32>,
    pub status_color: Option<String>,
    pub city: Option<String>,
}

impl ParkingSpot {
    pub fn new(
        name: impl Into<String>,
        coordinate: Coordinate,
        available: u32,
        hourly_rate: f64,
    ) -> Self {
        Self {
            name: name.into(),
            coordinate,
            available,
            hourly_rate,
            distance_km: None,
            total_capacity: None,
            predicted_occupied: None,
            status_color: None,
            city: None,
        }
    }

    pub fn availability(&self) -> Availability {
        Availability::from_available(self.available)
    }

    /// "OPEN" while at least one space is free
    pub fn status_label(&self) -> &'static str {
        if self.available > 0 { "OPEN" } else { "FULL" }
    }

    /// Fill in `distance_km` from `origin` when the feed did not supply it
    pub fn with_distance_from(mut self, origin: &Coordinate) -> Self {
        if self.distance_km.is_none() {
            self.distance_km = Some(self.coordinate.distance_km(origin));
        }
        self
    }
}
