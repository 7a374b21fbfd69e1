pub mod coordinate;
pub mod spot;

pub use coordinate::Coordinate;
pub use spot::{Availability, ParkingSpot};
