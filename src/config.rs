use anyhow::{Context, Result};
use serde::Deserialize;

/// Backend used when neither context has a URL configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

/// Where the client is running when it talks to the backend.
///
/// Server-side and browser-side callers may reach the same backend through
/// different addresses (e.g. an internal hostname vs a public one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    Server,
    Browser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend address as seen from server-side code
    #[serde(default)]
    pub server_url: Option<String>,

    /// Backend address as seen from the browser
    #[serde(default)]
    pub browser_url: Option<String>,

    /// Fixed user id sent on session creation (generated when absent)
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            browser_url: None,
            user_id: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendConfig {
    /// Resolve the backend base URL for an execution context.
    ///
    /// The context's own address wins, then the other context's address, then
    /// [`DEFAULT_BACKEND_URL`], so both contexts land on the same backend.
    pub fn base_url(&self, context: ExecutionContext) -> String {
        let (own, other) = match context {
            ExecutionContext::Server => (&self.server_url, &self.browser_url),
            ExecutionContext::Browser => (&self.browser_url, &self.server_url),
        };

        own.iter()
            .chain(other.iter())
            .map(|url| url.trim())
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BACKEND_URL)
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Sampling cadence of the speaking indicator
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Mean byte magnitude above which a slot counts as speaking
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    #[serde(default = "default_fft_size")]
    pub fft_size: usize,

    #[serde(default = "default_smoothing")]
    pub smoothing: f32,

    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,

    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            threshold: default_threshold(),
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "enabled")]
    pub echo_cancellation: bool,

    #[serde(default = "enabled")]
    pub noise_suppression: bool,

    #[serde(default = "enabled")]
    pub auto_gain_control: bool,

    /// WAV file played back as the microphone by the bundled capture device
    #[serde(default)]
    pub wav_path: Option<String>,

    /// Length of each captured frame
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            wav_path: None,
            frame_ms: default_frame_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect on start-up and disconnect on shutdown
    #[serde(default = "enabled")]
    pub auto_connect: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            auto_connect: true,
        }
    }
}

impl Config {
    /// Load configuration from an optional file, overridden by `VOICE_CHAT__*`
    /// environment variables (e.g. `VOICE_CHAT__BACKEND__BROWSER_URL`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOICE_CHAT").separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_interval_ms() -> u64 {
    100
}

fn default_threshold() -> u8 {
    30
}

fn default_fft_size() -> usize {
    256
}

fn default_smoothing() -> f32 {
    0.8
}

fn default_min_decibels() -> f32 {
    -100.0
}

fn default_max_decibels() -> f32 {
    -30.0
}

fn default_frame_ms() -> u64 {
    20
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn enabled() -> bool {
    true
}
