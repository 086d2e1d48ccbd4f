// SPDX-License-Identifier: MPL-2.0

//! # Weather Fetching Module
//!
//! Talks to the QWeather "now" endpoint and turns its response into a
//! [`WeatherSnapshot`].
//!
//! ## API Integration
//!
//! ```text
//! GET https://devapi.qweather.com/v7/weather/now?location={location}&key={api_key}
//! ```
//!
//! The body is JSON with a `code` status string and a `now` object holding
//! `text`, `temp` and `icon` (plus fields the widget does not use). QWeather
//! always answers gzip-compressed, so reqwest is built with `gzip`.
//!
//! ## Error Handling
//!
//! Every failure is returned as a [`FetchError`]; nothing here panics. The
//! caller decides what stays on screen.

use crate::config::WidgetConfig;
use serde::Deserialize;
use std::time::Duration;

/// Production QWeather host.
pub const QWEATHER_BASE_URL: &str = "https://devapi.qweather.com";

/// Page opened on double-click.
pub const FORECAST_PAGE_BASE: &str = "http://www.weather.com.cn/weather1d";

/// Upper bound for a single request so a hung server cannot stall refreshes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Status code QWeather reports for a successful query.
const API_OK: &str = "200";

// ============================================================================
// Snapshot
// ============================================================================

/// Current conditions as shown by the widget.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// Localised condition text, e.g. "Sunny" or "晴"
    pub condition_text: String,
    /// Temperature in Celsius
    pub temperature: f32,
    /// QWeather icon code, e.g. "100"
    pub icon_code: String,
}

impl WeatherSnapshot {
    /// Text shown next to the icon: condition on the first line,
    /// temperature on the second.
    pub fn display_text(&self) -> String {
        format!("{}\n{}℃", self.condition_text, self.temperature)
    }
}

/// Weather fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("QWeather returned code {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

// ============================================================================
// QWeather Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct NowResponse {
    #[serde(default)]
    code: Option<LooseValue>,
    now: Option<NowBlock>,
}

#[derive(Debug, Deserialize)]
struct NowBlock {
    text: String,
    temp: LooseValue,
    icon: LooseValue,
}

/// QWeather encodes numbers as strings; accept both forms.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LooseValue {
    Text(String),
    Number(f64),
}

impl LooseValue {
    fn into_text(self) -> String {
        match self {
            LooseValue::Text(s) => s,
            LooseValue::Number(n) => n.to_string(),
        }
    }
}

/// Parse a `/v7/weather/now` response body.
pub fn parse_now(body: &str) -> Result<WeatherSnapshot, FetchError> {
    let response: NowResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    if let Some(code) = response.code.map(LooseValue::into_text) {
        if code != API_OK {
            return Err(FetchError::Api(code));
        }
    }

    let now = response
        .now
        .ok_or_else(|| FetchError::Parse("missing `now` object".to_string()))?;

    let temperature = match now.temp {
        LooseValue::Number(n) => n as f32,
        LooseValue::Text(s) => s
            .trim()
            .parse::<f32>()
            .map_err(|_| FetchError::Parse(format!("temperature {:?} is not a number", s)))?,
    };

    Ok(WeatherSnapshot {
        condition_text: now.text,
        temperature,
        icon_code: now.icon.into_text(),
    })
}

/// URL of the forecast page for a location. The location is inserted as
/// configured, so `lon,lat` keeps its comma.
pub fn forecast_page_url(location: &str) -> String {
    format!("{}/{}.shtml", FORECAST_PAGE_BASE, location)
}

// ============================================================================
// Weather Sources
// ============================================================================

/// Anything that can produce the current conditions.
///
/// Implementations run on the refresh worker thread, so they only need to be
/// `Send`.
pub trait WeatherSource: Send + 'static {
    fn fetch(&self) -> Result<WeatherSnapshot, FetchError>;
}

/// Blocking QWeather client.
pub struct QWeatherClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    location: String,
}

impl QWeatherClient {
    pub fn new(config: &WidgetConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: QWEATHER_BASE_URL.to_string(),
            api_key: config.api_key.clone(),
            location: config.location.clone(),
        })
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v7/weather/now?location={}&key={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.location),
            urlencoding::encode(&self.api_key)
        )
    }
}

impl WeatherSource for QWeatherClient {
    fn fetch(&self) -> Result<WeatherSnapshot, FetchError> {
        log::debug!("Requesting current weather for location {}", self.location);

        let response = self.client.get(self.request_url()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text()?;
        log::trace!("Weather API response: {}", body);

        parse_now(&body)
    }
}
