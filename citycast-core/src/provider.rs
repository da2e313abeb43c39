use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::FetchError, model::WeatherSnapshot};

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// HTTP seam between the controller and the weather service.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions for `city`, in metric units.
    async fn current_conditions(
        &self,
        city: &str,
        api_key: &str,
    ) -> Result<WeatherSnapshot, FetchError>;
}
