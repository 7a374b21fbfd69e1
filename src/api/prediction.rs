use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{Coordinate, ParkingSpot};
use crate::feed::{FeedError, FieldAliases, SpotSource, parse_response};

pub const DEFAULT_ENDPOINT: &str = "https://smart-parking-api-1i5w.onrender.com/predict";
pub const DEFAULT_CITY: &str = "India_Cities";
const USER_AGENT: &str = concat!("parkwatch/", env!("CARGO_PKG_VERSION"));

/// Request body layout sent to the prediction service
///
/// The service's expected keys are not documented, so the layout is chosen
/// in configuration rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PayloadStyle {
    /// `{"city": ...}`
    #[default]
    City,
    /// `{"user_lat": ..., "user_lng": ...}`
    Coordinates,
    /// Every key name the service has been seen to read
    Compat,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PredictionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl PredictionRequest {
    pub fn build(style: PayloadStyle, center: Coordinate, city: &str) -> Self {
        let (lat, lng) = (Some(center.latitude), Some(center.longitude));
        let empty = Self {
            latitude: None,
            longitude: None,
            user_lat: None,
            user_lng: None,
            lat: None,
            lng: None,
            city: None,
        };

        match style {
            PayloadStyle::City => Self {
                city: Some(city.to_string()),
                ..empty
            },
            PayloadStyle::Coordinates => Self {
                user_lat: lat,
                user_lng: lng,
                ..empty
            },
            PayloadStyle::Compat => Self {
                latitude: lat,
                longitude: lng,
                user_lat: lat,
                user_lng: lng,
                lat,
                lng,
                city: Some(city.to_string()),
            },
        }
    }
}

/// Blocking client for the parking prediction endpoint
pub struct PredictionClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    style: PayloadStyle,
    city: String,
    aliases: FieldAliases,
}

impl PredictionClient {
    /// # Arguments
    /// * `endpoint` - Full URL of the predict route
    /// * `timeout` - Per-request timeout; a stalled request fails the cycle
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            style: PayloadStyle::default(),
            city: DEFAULT_CITY.to_string(),
            aliases: FieldAliases::default(),
        })
    }

    pub fn with_payload(mut self, style: PayloadStyle, city: impl Into<String>) -> Self {
        self.style = style;
        self.city = city.into();
        self
    }

    pub fn with_aliases(mut self, aliases: FieldAliases) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SpotSource for PredictionClient {
    fn fetch(&self, center: Coordinate) -> Result<Vec<ParkingSpot>, FeedError> {
        let payload = PredictionRequest::build(self.style, center, &self.city);
        tracing::debug!(endpoint = %self.endpoint, ?payload, "requesting predictions");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.text()?;
        parse_response(&body, &self.aliases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one HTTP response on a loopback port; returns the URL
    /// and a handle yielding the request body the client sent.
    fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/predict", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':')
                    && name.eq_ignore_ascii_case("content-length")
                {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();

            String::from_utf8(request_body).unwrap()
        });

        (url, handle)
    }

    fn center() -> Coordinate {
        Coordinate::new(26.14, 91.64)
    }

    #[test]
    fn test_city_payload() {
        let req = PredictionRequest::build(PayloadStyle::City, center(), "India_Cities");
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"city": "India_Cities"}));
    }

    #[test]
    fn test_coordinates_payload() {
        let req = PredictionRequest::build(PayloadStyle::Coordinates, center(), "ignored");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"user_lat": 26.14, "user_lng": 91.64})
        );
    }

    #[test]
    fn test_compat_payload_carries_every_key() {
        let req = PredictionRequest::build(PayloadStyle::Compat, center(), "Guwahati");
        let value = serde_json::to_value(&req).unwrap();
        for key in ["latitude", "longitude", "user_lat", "user_lng", "lat", "lng", "city"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_fetch_wrapped_response() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"predictions":[{"latitude":10,"longitude":20,"available":0,"location_name":"A","hourly_rate":30}]}"#,
        );
        let client = PredictionClient::new(url, Duration::from_secs(5)).unwrap();

        let spots = client.fetch(center()).unwrap();
        let sent = server.join().unwrap();

        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].name, "A");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&sent).unwrap(),
            json!({"city": "India_Cities"})
        );
    }

    #[test]
    fn test_fetch_bare_list_with_coordinates_payload() {
        let (url, server) = serve_once(
            "200 OK",
            r#"[{"lat":26.15,"lng":91.7,"available_count":3,"name":"B","hourly_rate":15}]"#,
        );
        let client = PredictionClient::new(url, Duration::from_secs(5))
            .unwrap()
            .with_payload(PayloadStyle::Coordinates, DEFAULT_CITY);

        let spots = client.fetch(center()).unwrap();
        let sent: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();

        assert_eq!(spots[0].available, 3);
        assert_eq!(sent["user_lat"], json!(26.14));
    }

    #[test]
    fn test_fetch_server_error() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#);
        let client = PredictionClient::new(url, Duration::from_secs(5)).unwrap();

        let result = client.fetch(center());
        server.join().unwrap();

        assert!(matches!(result, Err(FeedError::Status(500))));
    }
}
