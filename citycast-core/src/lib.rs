//! Core library for the `citycast` weather widget.
//!
//! This crate defines:
//! - Configuration & credential handling
//! - The OpenWeather current-conditions client
//! - The fetch-state controller that the UI drives
//! - Shared domain models (city, snapshot, fetch state)
//!
//! It is used by `citycast-cli`, but any rendering layer can drive a
//! [`WeatherFetchController`].

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod provider;

pub use config::{Config, CredentialSource, ProviderConfig};
pub use controller::{FetchDone, WeatherFetchController};
pub use error::FetchError;
pub use model::{City, FetchState, WeatherSnapshot};
pub use provider::{OpenWeatherProvider, WeatherProvider};
