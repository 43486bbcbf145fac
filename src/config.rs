//! Configuration management for ohiflaunch using the prefer crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::busy::{BusyConfig, DEFAULT_INCREMENT};
use crate::error::ConfigError;
use crate::navigator::DEFAULT_VIEWER_ROUTE;

/// Default archive location when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Archive root URL, including any context path.
    pub base_url: String,
    /// Route of the viewer on the archive host.
    pub viewer_route: String,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Spinner redraw interval in milliseconds.
    pub spinner_speed_ms: u64,
    /// Spinner rotation per redraw in degrees.
    pub spinner_increment: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            viewer_route: DEFAULT_VIEWER_ROUTE.to_string(),
            user_agent: crate::archive::resolve_user_agent(None),
            request_timeout: 30,
            username: None,
            password: None,
            spinner_speed_ms: 8,
            spinner_increment: DEFAULT_INCREMENT,
        }
    }
}

impl Settings {
    /// Parsed archive root URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|source| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            source,
        })
    }

    pub fn busy_config(&self) -> BusyConfig {
        BusyConfig {
            speed: Duration::from_millis(self.spinner_speed_ms.max(1)),
            increment: self.spinner_increment,
        }
    }

    /// Check that the settings can be used to reach the archive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::PasswordWithoutUser);
        }
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Archive root URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Viewer route.
    #[serde(default)]
    pub viewer_route: Option<String>,
    /// User agent string.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub request_timeout: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub spinner_speed_ms: Option<u64>,
    #[serde(default)]
    pub spinner_increment: Option<u16>,
}

impl Config {
    /// Load configuration using prefer crate.
    /// Automatically discovers ohiflaunch config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("ohiflaunch").await {
            Ok(pref_config) => {
                let base_url: Option<String> = pref_config.get("base_url").ok();
                let viewer_route: Option<String> = pref_config.get("viewer_route").ok();
                let user_agent: Option<String> = pref_config.get("user_agent").ok();
                let request_timeout: Option<u64> = pref_config.get("request_timeout").ok();
                let username: Option<String> = pref_config.get("username").ok();
                let password: Option<String> = pref_config.get("password").ok();
                let spinner_speed_ms: Option<u64> = pref_config.get("spinner_speed_ms").ok();
                let spinner_increment: Option<u16> = pref_config.get("spinner_increment").ok();

                Config {
                    base_url,
                    viewer_route,
                    user_agent,
                    request_timeout,
                    username,
                    password,
                    spinner_speed_ms,
                    spinner_increment,
                }
            }
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(ref route) = self.viewer_route {
            settings.viewer_route = route.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = crate::archive::resolve_user_agent(Some(user_agent));
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref username) = self.username {
            settings.username = Some(username.clone());
        }
        if let Some(ref password) = self.password {
            settings.password = Some(password.clone());
        }
        if let Some(speed) = self.spinner_speed_ms {
            settings.spinner_speed_ms = speed;
        }
        if let Some(increment) = self.spinner_increment {
            settings.spinner_increment = increment;
        }
    }
}

/// Load settings from configuration (async version).
pub async fn load_settings() -> Settings {
    let config = Config::load().await;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    settings
}
