//! parkwatch - Live parking availability around you, polled from a prediction service

pub mod api;
pub mod config;
pub mod domain;
pub mod feed;
pub mod geometry;
pub mod location;
pub mod map;
pub mod session;

pub use domain::{Availability, Coordinate, ParkingSpot};
pub use feed::{FeedError, FeedStopper, SpotFeed, SpotSource};
pub use location::{LocationResolver, Resolution};
pub use map::{MapBackend, MapView, Scene};
pub use session::{Session, StatusBoard};
