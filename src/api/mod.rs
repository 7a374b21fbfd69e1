pub mod nominatim;
pub mod prediction;

pub use nominatim::geocode_city;
pub use prediction::{
    DEFAULT_CITY, DEFAULT_ENDPOINT, PayloadStyle, PredictionClient, PredictionRequest,
};
