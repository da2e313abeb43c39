//! The fetch-state machine behind the widget.
//!
//! The controller lives on the UI event loop and is only mutated there. Each
//! lookup runs on a spawned task that reports back over a channel tagged with
//! the generation it was started for; anything older than the current
//! generation is dropped on arrival.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    config::CredentialSource,
    error::FetchError,
    model::{City, FetchState, WeatherSnapshot},
    provider::WeatherProvider,
};

/// Result of one fetch, as posted back by its task.
#[derive(Debug)]
pub struct FetchDone {
    pub generation: u64,
    pub result: Result<WeatherSnapshot, FetchError>,
}

/// Posts its generation's completion when dropped, so a task that panics
/// still resolves the fetch instead of leaving it `Loading`.
struct CompletionSlot {
    generation: u64,
    tx: mpsc::UnboundedSender<FetchDone>,
    result: Option<Result<WeatherSnapshot, FetchError>>,
}

impl Drop for CompletionSlot {
    fn drop(&mut self) {
        let result = self.result.take().unwrap_or_else(|| {
            Err(FetchError::Transport("weather request ended without a result".into()))
        });
        // The receiver lives as long as the controller; a send error only
        // means the controller is gone.
        let _ = self.tx.send(FetchDone {
            generation: self.generation,
            result,
        });
    }
}

#[derive(Debug)]
pub struct WeatherFetchController {
    city: City,
    state: FetchState,
    generation: u64,
    provider: Arc<dyn WeatherProvider>,
    credentials: Arc<dyn CredentialSource>,
    in_flight: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<FetchDone>,
    rx: mpsc::UnboundedReceiver<FetchDone>,
}

impl WeatherFetchController {
    /// Controller in `Idle`, targeting `default_city`. Call [`start`](Self::start)
    /// to begin the first lookup.
    pub fn new(
        default_city: City,
        provider: Arc<dyn WeatherProvider>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            city: default_city,
            state: FetchState::Idle,
            generation: 0,
            provider,
            credentials,
            in_flight: None,
            tx,
            rx,
        }
    }

    /// Begin fetching the default city. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        self.fetch();
    }

    /// Replace the target city and fetch it, even if it is unchanged.
    pub fn set_city(&mut self, city: City) {
        info!(city = %city, "City submitted");
        self.city = city;
        self.fetch();
    }

    pub fn city(&self) -> &City {
        &self.city
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_loading()
    }

    fn fetch(&mut self) {
        self.generation += 1;
        let generation = self.generation;

        if let Some(task) = self.in_flight.take() {
            task.abort();
        }

        self.state = FetchState::Loading;

        let Some(api_key) = self.credentials.api_key() else {
            warn!(generation, "No API key configured, skipping request");
            self.state = FetchState::Failed(FetchError::MissingCredential);
            return;
        };

        debug!(generation, city = %self.city, "Starting fetch");

        let provider = Arc::clone(&self.provider);
        let city = self.city.clone();
        let slot = CompletionSlot {
            generation,
            tx: self.tx.clone(),
            result: None,
        };

        self.in_flight = Some(tokio::spawn(async move {
            let mut slot = slot;
            slot.result = Some(provider.current_conditions(city.as_str(), &api_key).await);
        }));
    }

    /// Wait for the next completed fetch and apply it.
    ///
    /// Returns `true` when the state changed. Pends forever while nothing is in
    /// flight, so it is meant to sit in a `select!` next to user input.
    pub async fn next_completion(&mut self) -> bool {
        match self.rx.recv().await {
            Some(done) => self.apply(done),
            None => false,
        }
    }

    /// Run until the current fetch has resolved.
    pub async fn settle(&mut self) -> &FetchState {
        while self.is_busy() {
            self.next_completion().await;
        }
        &self.state
    }

    /// Apply a completion if it belongs to the latest fetch.
    pub fn apply(&mut self, done: FetchDone) -> bool {
        if done.generation != self.generation || !self.is_busy() {
            debug!(
                generation = done.generation,
                current = self.generation,
                "Discarding stale response"
            );
            return false;
        }

        self.in_flight = None;
        self.state = match done.result {
            Ok(snapshot) => {
                debug!(generation = done.generation, location = %snapshot.location_name, "Fetch succeeded");
                FetchState::Success(snapshot)
            }
            Err(err) => {
                warn!(generation = done.generation, kind = err.kind(), error = %err, "Fetch failed");
                FetchState::Failed(err)
            }
        };
        true
    }
}

impl Drop for WeatherFetchController {
    fn drop(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}
