use std::{io::Write, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use citycast_core::{City, Config, OpenWeatherProvider, WeatherFetchController};

use crate::view;

const QUIT: &str = ":q";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "citycast", version, about = "Current weather for any city")]
pub struct Cli {
    /// Log at info level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Defaults to `watch`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and the startup city.
    Configure,

    /// Look up one city and print the result.
    Show {
        /// City name; the configured default city if absent.
        city: Option<String>,
    },

    /// Interactive widget: type a city name to search, `:q` to quit.
    Watch,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command.unwrap_or(Command::Watch) {
            Command::Configure => configure(),
            Command::Show { city } => show(city).await,
            Command::Watch => watch().await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    // Read the file directly so an environment key is never written back.
    let mut config = Config::load_from(&Config::config_file_path()?)?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(&api_key);

    let current = config.default_city();
    let city = Text::new("Default city:")
        .with_default(current.as_str())
        .prompt()
        .context("Failed to read default city")?;
    if let Some(city) = City::parse(&city) {
        config.set_default_city(city);
    }

    let path = config.save()?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn controller_for(config: Config, city: City) -> anyhow::Result<WeatherFetchController> {
    let provider = Arc::new(OpenWeatherProvider::new(&config.openweather)?);
    Ok(WeatherFetchController::new(city, provider, Arc::new(config)))
}

async fn show(city: Option<String>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let city = match city {
        Some(name) => City::parse(&name).ok_or_else(|| anyhow!("City name must not be blank"))?,
        None => config.default_city(),
    };

    let mut controller = controller_for(config, city)?;
    controller.start();
    controller.settle().await;

    println!("{}", view::render(controller.city(), controller.state()));
    Ok(())
}

async fn watch() -> anyhow::Result<()> {
    let config = Config::load()?;
    let city = config.default_city();
    let mut controller = controller_for(config, city)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    controller.start();
    redraw(&controller)?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                if line.trim() == QUIT {
                    break;
                }
                match City::parse(&line) {
                    Some(city) => {
                        controller.set_city(city);
                        redraw(&controller)?;
                    }
                    None => debug!("Ignoring blank input"),
                }
            }
            changed = controller.next_completion() => {
                if changed {
                    redraw(&controller)?;
                }
            }
        }
    }

    Ok(())
}

fn redraw(controller: &WeatherFetchController) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "\n{}", view::render(controller.city(), controller.state()))?;
    write!(out, "city> ")?;
    out.flush()?;
    Ok(())
}
