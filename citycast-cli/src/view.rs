//! Plain-text rendering of the controller state.
//!
//! Everything here is a pure function of its inputs so the same state always
//! renders the same way.

use citycast_core::{City, FetchState, WeatherSnapshot};

pub fn render(city: &City, state: &FetchState) -> String {
    match state {
        FetchState::Idle => format!("Enter a city name (current: {city})"),
        FetchState::Loading => format!("Loading weather for {city}..."),
        FetchState::Success(snapshot) => render_snapshot(snapshot),
        FetchState::Failed(err) => format!("Could not load weather for {city}: {err}"),
    }
}

pub fn render_snapshot(s: &WeatherSnapshot) -> String {
    let location = match &s.country {
        Some(country) => format!("{}, {}", s.location_name, country),
        None => s.location_name.clone(),
    };

    [
        location,
        format!("  {}  {}", temperature(s.temperature_c), s.description),
        format!("  Feels like {}", temperature(s.feels_like_c)),
        format!("  Humidity   {}%", s.humidity_pct),
        format!("  Wind       {:.1} m/s", s.wind_speed_mps),
        format!("  Pressure   {} hPa", s.pressure_hpa.round()),
        format!("  Updated    {}", s.observed_at.format("%Y-%m-%d %H:%M UTC")),
    ]
    .join("\n")
}

/// Whole degrees, without a stray "-0".
pub fn temperature(celsius: f64) -> String {
    let rounded = celsius.round();
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded}°C")
}
