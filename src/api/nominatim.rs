use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::thread;
use std::time::Duration;

use crate::domain::Coordinate;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = concat!("parkwatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[allow(dead_code)]
    display_name: String,
}

/// Geocode a city name to a coordinate.
///
/// Uses the Nominatim API to convert "{city}, {country}" to a point.
/// Includes a 1 second delay for rate limiting (Nominatim ToS).
///
/// # Arguments
/// * `city` - City name (e.g., "Guwahati")
/// * `country` - Country name (e.g., "India")
/// * `timeout` - HTTP timeout for the lookup
pub fn geocode_city(city: &str, country: &str, timeout: Duration) -> Result<Coordinate> {
    // Nominatim requires max 1 request per second
    thread::sleep(Duration::from_secs(1));

    let query = format!("{}, {}", city, country);

    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(NOMINATIM_URL)
        .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
        .send()
        .context("Failed to send request to Nominatim API")?;

    if !response.status().is_success() {
        bail!("Nominatim API returned error status: {}", response.status());
    }

    let results: Vec<NominatimResult> = response
        .json()
        .context("Failed to parse Nominatim JSON response")?;

    first_coordinate(results).with_context(|| format!("City not found: {}, {}", city, country))
}

fn first_coordinate(results: Vec<NominatimResult>) -> Result<Coordinate> {
    let result = results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty result set"))?;

    let lat: f64 = result
        .lat
        .parse()
        .context("Failed to parse latitude from Nominatim response")?;
    let lon: f64 = result
        .lon
        .parse()
        .context("Failed to parse longitude from Nominatim response")?;

    Ok(Coordinate::new(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nominatim_response() {
        let json = r#"[{"lat":"26.1805978","lon":"91.7539416","display_name":"Guwahati, Kamrup Metropolitan, Assam, India"}]"#;
        let results: Vec<NominatimResult> = serde_json::from_str(json).unwrap();
        let coord = first_coordinate(results).unwrap();

        assert!((coord.latitude - 26.1805978).abs() < 1e-9);
        assert!((coord.longitude - 91.7539416).abs() < 1e-9);
    }

    #[test]
    fn test_empty_response_is_error() {
        assert!(first_coordinate(Vec::new()).is_err());
    }
}
