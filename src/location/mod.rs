//! Best-effort location lookup with a fixed fallback.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::geocode_city;
use crate::domain::Coordinate;

/// Guwahati, used whenever no location can be obtained
pub const FALLBACK: Coordinate = Coordinate {
    latitude: 26.14,
    longitude: 91.64,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const PROMPT_TEXT: &str = "Please allow location access...";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    #[error("location access denied")]
    PermissionDenied,

    #[error("location lookup timed out")]
    Timeout,

    #[error("no location source available")]
    Unsupported,

    #[error("location lookup failed: {0}")]
    Lookup(String),
}

/// Something that can report where the user is
pub trait LocationSource: Send + Sync {
    fn locate(&self) -> Result<Coordinate, LocationError>;
}

/// Coordinates supplied directly by the user
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinate);

impl LocationSource for FixedLocation {
    fn locate(&self) -> Result<Coordinate, LocationError> {
        if self.0.is_valid() {
            Ok(self.0)
        } else {
            Err(LocationError::Lookup(format!("invalid coordinate {:?}", self.0)))
        }
    }
}

/// City name resolved through Nominatim
#[derive(Debug, Clone)]
pub struct GeocodedLocation {
    pub city: String,
    pub country: String,
    pub timeout: Duration,
}

impl LocationSource for GeocodedLocation {
    fn locate(&self) -> Result<Coordinate, LocationError> {
        geocode_city(&self.city, &self.country, self.timeout)
            .map_err(|e| LocationError::Lookup(format!("{e:#}")))
    }
}

/// No location capability at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationSource for NoLocation {
    fn locate(&self) -> Result<Coordinate, LocationError> {
        Err(LocationError::Unsupported)
    }
}

/// Location inputs from one configuration layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationHints {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Which kind of source to resolve with
#[derive(Debug, Clone, PartialEq)]
pub enum LocationChoice {
    Coordinates(Coordinate),
    City { city: String, country: String },
    Nothing,
}

impl LocationHints {
    fn choice(&self) -> Option<LocationChoice> {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            return Some(LocationChoice::Coordinates(Coordinate::new(lat, lon)));
        }
        match (&self.city, &self.country) {
            (Some(city), Some(country)) => Some(LocationChoice::City {
                city: city.clone(),
                country: country.clone(),
            }),
            _ => None,
        }
    }
}

/// Pick a location source. Any usable command-line input wins over the
/// config file; within a layer, coordinates win over a city name.
pub fn choose_location(cli: &LocationHints, file: &LocationHints) -> LocationChoice {
    cli.choice()
        .or_else(|| file.choice())
        .unwrap_or(LocationChoice::Nothing)
}

impl LocationChoice {
    pub fn into_source(self, timeout: Duration) -> Box<dyn LocationSource> {
        match self {
            LocationChoice::Coordinates(c) => Box::new(FixedLocation(c)),
            LocationChoice::City { city, country } => Box::new(GeocodedLocation {
                city,
                country,
                timeout,
            }),
            LocationChoice::Nothing => Box::new(NoLocation),
        }
    }
}

/// How a resolution ended, for status display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    Resolved,
    Blocked,
    Unsupported,
}

impl LocationStatus {
    pub fn message(self) -> &'static str {
        match self {
            LocationStatus::Resolved => "Location successfully retrieved.",
            LocationStatus::Blocked => "Location Blocked. Using Default View.",
            LocationStatus::Unsupported => "Location unsupported. Using Default View.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub coordinate: Coordinate,
    pub succeeded: bool,
    pub status: LocationStatus,
}

impl Resolution {
    /// Label for the center marker
    pub fn marker_label(&self) -> &'static str {
        if self.succeeded {
            "You are here"
        } else {
            "Default Location"
        }
    }
}

pub struct LocationResolver {
    source: Box<dyn LocationSource>,
    fallback: Coordinate,
    timeout: Duration,
}

impl LocationResolver {
    pub fn new(source: Box<dyn LocationSource>) -> Self {
        Self {
            source,
            fallback: FALLBACK,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_fallback(mut self, fallback: Coordinate) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Look up the current location, waiting at most the configured timeout.
    ///
    /// Never fails: any error, panic or overrun in the source yields the
    /// fallback coordinate with `succeeded == false`.
    pub fn resolve(self) -> Resolution {
        let LocationResolver {
            source,
            fallback,
            timeout,
        } = self;

        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("location".to_string())
            .spawn(move || {
                // Receiver may have given up already
                let _ = tx.send(source.locate());
            });

        let outcome = match spawned {
            Ok(_) => match rx.recv_timeout(timeout) {
                Ok(result) => result,
                Err(mpsc::RecvTimeoutError::Timeout) => Err(LocationError::Timeout),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    Err(LocationError::Lookup("location source panicked".to_string()))
                }
            },
            Err(e) => Err(LocationError::Lookup(e.to_string())),
        };

        match outcome {
            Ok(coordinate) => {
                info!(%coordinate, "location resolved");
                Resolution {
                    coordinate,
                    succeeded: true,
                    status: LocationStatus::Resolved,
                }
            }
            Err(e) => {
                warn!(error = %e, fallback = %fallback, "location unavailable, using fallback");
                let status = match e {
                    LocationError::Unsupported => LocationStatus::Unsupported,
                    _ => LocationStatus::Blocked,
                };
                Resolution {
                    coordinate: fallback,
                    succeeded: false,
                    status,
                }
            }
        }
    }
}
