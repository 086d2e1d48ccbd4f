// SPDX-License-Identifier: MPL-2.0

//! # Refresh Controller
//!
//! Drives the periodic weather refresh.
//!
//! ## State Machine
//!
//! ```text
//!        tick()                 result delivered
//! Idle ─────────▶ Fetching ─────────────────────▶ Idle
//!                    │ tick() while fetching: skipped
//! ```
//!
//! `tick()` runs once at startup and then every [`REFRESH_INTERVAL`].
//!
//! ## Threading Model
//!
//! The HTTP request runs on a dedicated worker thread that owns the
//! [`WeatherSource`]. The UI thread only sends a request token; the result
//! comes back through the `deliver` callback (a channel into the event loop
//! in production). Dropping the controller closes the request channel and
//! the worker exits.

use super::display::DisplayModel;
use super::icons::IconResolver;
use super::weather::{FetchError, WeatherSnapshot, WeatherSource};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Time between refreshes.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(1800);

/// Outcome of one refresh.
pub type FetchResult = Result<WeatherSnapshot, FetchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
}

pub struct RefreshController {
    state: RefreshState,
    requests: mpsc::Sender<()>,
}

impl RefreshController {
    /// Spawn the fetch worker.
    ///
    /// `deliver` is invoked on the worker thread with each finished result.
    pub fn spawn<S, F>(source: S, deliver: F) -> std::io::Result<Self>
    where
        S: WeatherSource,
        F: Fn(FetchResult) + Send + 'static,
    {
        let (requests, pending) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("weather-fetch".to_string())
            .spawn(move || {
                for () in pending {
                    deliver(source.fetch());
                }
                log::debug!("Weather fetch worker exiting");
            })?;

        Ok(Self {
            state: RefreshState::Idle,
            requests,
        })
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        REFRESH_INTERVAL
    }

    /// Start a refresh unless one is already in flight.
    ///
    /// Returns `true` if a fetch was submitted.
    pub fn tick(&mut self) -> bool {
        if self.state == RefreshState::Fetching {
            log::debug!("Weather refresh already in flight, skipping tick");
            return false;
        }

        log::info!("Starting weather refresh");
        if self.requests.send(()).is_err() {
            log::error!("Weather fetch worker is gone, refresh skipped");
            return false;
        }

        self.state = RefreshState::Fetching;
        true
    }

    /// Finish the in-flight refresh and push its result into the display.
    pub fn on_result(
        &mut self,
        result: FetchResult,
        display: &mut DisplayModel,
        icons: &mut IconResolver,
    ) {
        self.state = RefreshState::Idle;
        display.apply(result, icons);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsStore;
    use crate::widget::weather::{test_server, QWeatherClient};

    const WAIT: Duration = Duration::from_secs(5);

    /// Hands out whatever results the test feeds it, one per fetch.
    struct ScriptedSource(mpsc::Receiver<FetchResult>);

    impl WeatherSource for ScriptedSource {
        fn fetch(&self) -> FetchResult {
            self.0
                .recv()
                .unwrap_or_else(|_| Err(FetchError::Parse("script ended".to_string())))
        }
    }

    fn scripted() -> (mpsc::Sender<FetchResult>, RefreshController, mpsc::Receiver<FetchResult>) {
        let (script, source) = mpsc::channel();
        let (delivered_tx, delivered) = mpsc::channel();
        let controller = RefreshController::spawn(ScriptedSource(source), move |result| {
            let _ = delivered_tx.send(result);
        })
        .unwrap();
        (script, controller, delivered)
    }

    fn sunny() -> WeatherSnapshot {
        WeatherSnapshot {
            condition_text: "Sunny".to_string(),
            temperature: 23.0,
            icon_code: "100".to_string(),
        }
    }

    #[test]
    fn test_tick_cycles_idle_fetching_idle() {
        let (script, mut controller, delivered) = scripted();
        let dir = tempfile::tempdir().unwrap();
        let mut icons = IconResolver::new(dir.path());
        let mut display = DisplayModel::new();

        assert_eq!(controller.state(), RefreshState::Idle);
        assert!(controller.tick());
        assert_eq!(controller.state(), RefreshState::Fetching);

        script.send(Ok(sunny())).unwrap();
        let result = delivered.recv_timeout(WAIT).unwrap();
        controller.on_result(result, &mut display, &mut icons);

        assert_eq!(controller.state(), RefreshState::Idle);
        assert_eq!(display.text(), "Sunny\n23℃");
    }

    #[test]
    fn test_tick_while_fetching_is_skipped() {
        let (script, mut controller, delivered) = scripted();
        let dir = tempfile::tempdir().unwrap();
        let mut icons = IconResolver::new(dir.path());
        let mut display = DisplayModel::new();

        assert!(controller.tick());
        assert!(!controller.tick());

        script.send(Ok(sunny())).unwrap();
        let result = delivered.recv_timeout(WAIT).unwrap();
        controller.on_result(result, &mut display, &mut icons);

        // Only one fetch was requested, so nothing else arrives
        assert!(delivered.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(controller.tick());
    }

    #[test]
    fn test_identical_results_render_identically() {
        let (script, mut controller, delivered) = scripted();
        let dir = tempfile::tempdir().unwrap();
        let mut icons = IconResolver::new(dir.path());
        let mut display = DisplayModel::new();

        let mut states = Vec::new();
        for _ in 0..2 {
            assert!(controller.tick());
            script.send(Ok(sunny())).unwrap();
            let result = delivered.recv_timeout(WAIT).unwrap();
            controller.on_result(result, &mut display, &mut icons);
            states.push(display.visible());
        }

        assert_eq!(states[0], states[1]);
    }

    #[test]
    fn test_failed_refresh_keeps_snapshot() {
        let (script, mut controller, delivered) = scripted();
        let dir = tempfile::tempdir().unwrap();
        let mut icons = IconResolver::new(dir.path());
        let mut display = DisplayModel::new();

        controller.tick();
        script.send(Ok(sunny())).unwrap();
        controller.on_result(delivered.recv_timeout(WAIT).unwrap(), &mut display, &mut icons);

        controller.tick();
        script.send(Err(FetchError::Status(502))).unwrap();
        controller.on_result(delivered.recv_timeout(WAIT).unwrap(), &mut display, &mut icons);

        assert_eq!(controller.state(), RefreshState::Idle);
        assert_eq!(display.text(), "Sunny\n23℃");
        assert!(display.is_stale());
    }

    #[test]
    fn test_startup_refresh_end_to_end() {
        let settings = SettingsStore::parse(
            "setting.ini",
            "[General]\napi_key=k\nlocation=101010100\nw=200\nh=80\n",
        )
        .unwrap();
        let config = settings.widget_config();

        let (base_url, requests) = test_server::serve_once(
            200,
            r#"{"now": {"text": "Sunny", "temp": "23", "icon": "100"}}"#,
        );
        let client = QWeatherClient::new(&config).unwrap().with_base_url(base_url);

        let icon_dir = tempfile::tempdir().unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 255, 255, 255]))
            .save(icon_dir.path().join("100.png"))
            .unwrap();
        let mut icons = IconResolver::new(icon_dir.path());
        let mut display = DisplayModel::new();

        let (delivered_tx, delivered) = mpsc::channel();
        let mut controller = RefreshController::spawn(client, move |result| {
            let _ = delivered_tx.send(result);
        })
        .unwrap();

        assert!(controller.tick());
        let result = delivered.recv_timeout(WAIT).unwrap();
        controller.on_result(result, &mut display, &mut icons);

        assert!(requests.recv_timeout(WAIT).unwrap().contains("location=101010100&key=k"));
        assert_eq!(display.text(), "Sunny\n23℃");
        assert!(!display.icon().is_empty());

        let geometry = config.initial_geometry();
        assert_eq!((geometry.width, geometry.height), (200, 80));
    }
}
