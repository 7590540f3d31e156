//! Settings for the embedded web view, buildable in code or loaded from JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::guard::GuardKind;
use crate::Result;

/// Page loaded when no URL is configured.
pub const FALLBACK_URL: &str = "https://www.youtube.com/";

/// Lets media start without a user gesture.
pub const AUTOPLAY_ARGUMENT: &str = "--autoplay-policy=no-user-gesture-required";

/// How long `navigate` waits for the controller by default.
pub const DEFAULT_NAVIGATE_TIMEOUT: Duration = Duration::from_millis(5000);

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Settings for creating a web view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebViewSettings {
    /// Initial URL to load
    pub url: Option<String>,
    /// URL loaded when `url` is unset
    pub fallback_url: String,
    /// Enable JavaScript
    pub script_enabled: bool,
    /// Show the built-in alert/confirm/prompt dialogs
    pub default_script_dialogs_enabled: bool,
    /// Allow page <-> host web messages
    pub web_message_enabled: bool,
    /// Extra command-line switches for the browser process
    pub additional_browser_arguments: Vec<String>,
    /// Milliseconds `navigate` waits for the controller
    pub navigate_timeout_ms: u64,
    /// Profile directory; platform default when unset
    pub user_data_folder: Option<PathBuf>,
    /// Fixed-version runtime location; installed runtime when unset
    pub browser_executable_folder: Option<PathBuf>,
    /// Guard installed on the navigation-starting event
    pub navigation_guard: GuardKind,
    /// Title of the window created by the demo application
    pub window_title: String,
}

impl Default for WebViewSettings {
    fn default() -> Self {
        Self {
            url: None,
            fallback_url: FALLBACK_URL.to_string(),
            script_enabled: true,
            default_script_dialogs_enabled: true,
            web_message_enabled: true,
            additional_browser_arguments: vec![AUTOPLAY_ARGUMENT.to_string()],
            navigate_timeout_ms: millis(DEFAULT_NAVIGATE_TIMEOUT),
            user_data_folder: None,
            browser_executable_folder: None,
            navigation_guard: GuardKind::default(),
            window_title: "embedview".to_string(),
        }
    }
}

impl WebViewSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a JSON string. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&contents)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_navigate_timeout(mut self, timeout: Duration) -> Self {
        self.navigate_timeout_ms = millis(timeout);
        self
    }

    #[must_use]
    pub fn with_navigation_guard(mut self, guard: GuardKind) -> Self {
        self.navigation_guard = guard;
        self
    }

    #[must_use]
    pub fn with_browser_argument(mut self, argument: impl Into<String>) -> Self {
        self.additional_browser_arguments.push(argument.into());
        self
    }

    #[must_use]
    pub fn with_user_data_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.user_data_folder = Some(folder.into());
        self
    }

    #[must_use]
    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    /// The URL loaded right after the surface is created.
    #[must_use]
    pub fn initial_url(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.fallback_url)
    }

    #[must_use]
    pub fn navigate_timeout(&self) -> Duration {
        Duration::from_millis(self.navigate_timeout_ms)
    }

    #[must_use]
    pub fn environment_options(&self) -> EnvironmentOptions {
        EnvironmentOptions {
            additional_browser_arguments: self.additional_browser_arguments.join(" "),
            user_data_folder: self.user_data_folder.clone(),
            browser_executable_folder: self.browser_executable_folder.clone(),
        }
    }

    #[must_use]
    pub fn surface_settings(&self) -> SurfaceSettings {
        SurfaceSettings {
            script_enabled: self.script_enabled,
            default_script_dialogs_enabled: self.default_script_dialogs_enabled,
            web_message_enabled: self.web_message_enabled,
        }
    }
}

/// Options applied when the browser environment is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOptions {
    pub additional_browser_arguments: String,
    pub user_data_folder: Option<PathBuf>,
    pub browser_executable_folder: Option<PathBuf>,
}

/// Toggles applied to the surface once it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSettings {
    pub script_enabled: bool,
    pub default_script_dialogs_enabled: bool,
    pub web_message_enabled: bool,
}
