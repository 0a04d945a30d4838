use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://remotive.com/api/remote-jobs";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub page_size: usize,
    /// Page numbers shown on each side of the current page.
    pub window_delta: usize,
    /// Referral tag appended to apply links.
    pub via: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            page_size: 12,
            window_delta: 2,
            via: "tung".to_string(),
            timeout_secs: 30,
            user_agent: format!("remoteboard/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub page_size: Option<usize>,
    pub via: Option<String>,
}

impl Config {
    pub fn load(explicit: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => Self::default(),
            },
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "remoteboard")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Where the TUI writes its log, since it owns the terminal.
    pub fn log_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("", "", "remoteboard") {
            dirs.data_dir().join("remoteboard.log")
        } else {
            PathBuf::from("remoteboard.log")
        }
    }

    fn apply(&mut self, overrides: Overrides) {
        if let Some(api_url) = overrides.api_url {
            self.api_url = api_url;
        }
        if let Some(page_size) = overrides.page_size {
            self.page_size = page_size;
        }
        if let Some(via) = overrides.via {
            self.via = via;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.api_url.trim().is_empty() {
            bail!("api_url must not be empty");
        }
        if self.via.trim().is_empty() {
            bail!("via must not be empty");
        }
        Ok(())
    }
}
