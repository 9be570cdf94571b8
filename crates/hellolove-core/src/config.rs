use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use hellolove_schema::Settings;
use serde::{Deserialize, Serialize};

use crate::session::{SessionOptions, DEFAULT_GREETING_TEMPLATE};

pub const CONFIG_FILE_NAME: &str = "hellolove.yaml";

fn default_response_delay_ms() -> u64 {
    1000
}

fn default_greeting_template() -> String {
    DEFAULT_GREETING_TEMPLATE.to_string()
}

fn default_bus_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    #[serde(default = "default_response_delay_ms")]
    pub response_delay_ms: u64,
    #[serde(default = "default_greeting_template")]
    pub greeting_template: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_delay_ms: default_response_delay_ms(),
            greeting_template: default_greeting_template(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for rolling log files; defaults to `<config root>/logs`
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloLoveConfig {
    /// Settings the session starts with
    #[serde(default)]
    pub assistant: Settings,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl HelloLoveConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            initial_settings: self.assistant.clone(),
            response_delay: Duration::from_millis(self.session.response_delay_ms),
            greeting_template: self.session.greeting_template.clone(),
        }
    }
}

/// Loads the YAML config at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<HelloLoveConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        return Ok(HelloLoveConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(HelloLoveConfig::default());
    }
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

pub fn validate_config(config: &HelloLoveConfig) -> Result<()> {
    if config.assistant.assistant_name.trim().is_empty() {
        return Err(anyhow!("assistant.assistant_name must not be empty"));
    }
    if !config.session.greeting_template.contains("{name}") {
        return Err(anyhow!(
            "session.greeting_template must contain the {{name}} placeholder"
        ));
    }
    if config.bus.capacity == 0 {
        return Err(anyhow!("bus.capacity must be greater than zero"));
    }
    Ok(())
}

/// Writes the default config to `path`, refusing to clobber an existing file
/// unless `force` is set.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "config already exists: {} (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config dir: {}", parent.display()))?;
    }
    let yaml = serde_yaml::to_string(&HelloLoveConfig::default())
        .context("failed to serialize default config")?;
    fs::write(path, yaml)
        .with_context(|| format!("failed to write config file: {}", path.display()))
}

/// Expands a leading `~` using `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hellolove_schema::Theme;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, HelloLoveConfig::default());
        assert_eq!(config.session.response_delay_ms, 1000);
        assert_eq!(config.assistant.assistant_name, "Love");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "assistant:\n  assistant_name: Juno\n  theme: light\nsession:\n  response_delay_ms: 250\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.assistant.assistant_name, "Juno");
        assert_eq!(config.assistant.theme, Theme::Light);
        assert!(config.assistant.voice_enabled);
        assert_eq!(config.session.response_delay_ms, 250);
        assert_eq!(config.session.greeting_template, DEFAULT_GREETING_TEMPLATE);
        assert_eq!(config.bus.capacity, 256);

        let options = config.session_options();
        assert_eq!(options.response_delay, Duration::from_millis(250));
    }

    #[test]
    fn invalid_yaml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "session: [unclosed").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse yaml file"));
    }

    #[test]
    fn validate_rejects_template_without_placeholder() {
        let mut config = HelloLoveConfig::default();
        config.session.greeting_template = "Hi there".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("{name}"));
    }

    #[test]
    fn validate_rejects_empty_name_and_zero_capacity() {
        let mut config = HelloLoveConfig::default();
        config.assistant.assistant_name = " ".into();
        assert!(validate_config(&config).is_err());

        let mut config = HelloLoveConfig::default();
        config.bus.capacity = 0;
        assert!(validate_config(&config).is_err());

        assert!(validate_config(&HelloLoveConfig::default()).is_ok());
    }

    #[test]
    fn write_default_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        write_default_config(&path, false).unwrap();
        assert!(write_default_config(&path, false).is_err());
        write_default_config(&path, true).unwrap();

        assert_eq!(load_config(&path).unwrap(), HelloLoveConfig::default());
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home(Path::new("/etc/x")), PathBuf::from("/etc/x"));
    }
}
