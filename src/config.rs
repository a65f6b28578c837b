use crate::error::{ChatError, Result};
use crate::error_ext::ResultExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = ".ragchat";
const GLOBAL_CONFIG_FILE: &str = "config.toml";
const LOCAL_CONFIG_FILE: &str = "config.local.toml";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Central configuration for the chat client
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 300,
            connect_timeout_secs: 10,
            max_retries: 2,
        }
    }
}

/// One config file; every field is optional so files can override each other
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

impl ChatConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            ChatError::Config(format!("Invalid base_url '{}': {}", self.base_url, e))
        })?;

        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ChatError::Config(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn merge(&mut self, file: ConfigFile) {
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        if let Some(retries) = file.max_retries {
            self.max_retries = retries;
        }
    }
}

/// Load configuration from the global and the workspace-local config files.
/// The local file overrides the global one field by field.
pub fn load_config(workspace: &Path) -> ChatConfig {
    let mut config = ChatConfig::default();

    if let Some(home) = std::env::var_os("HOME") {
        let global_path = PathBuf::from(home).join(CONFIG_DIR).join(GLOBAL_CONFIG_FILE);
        apply_config_file(&mut config, &global_path);
    }

    let local_path = workspace.join(CONFIG_DIR).join(LOCAL_CONFIG_FILE);
    apply_config_file(&mut config, &local_path);

    config
}

fn apply_config_file(config: &mut ChatConfig, path: &Path) {
    match load_config_file(path) {
        Ok(Some(file)) => {
            tracing::debug!(path = %path.display(), "Loaded config file");
            config.merge(file);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
        }
    }
}

fn load_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&content)
        .map_err(|e| ChatError::Config(format!("{}: {}", path.display(), e)))?;

    Ok(Some(file))
}
