use std::path::Path;

use config::ConfigError;
use serde::Deserialize;

use crate::utils;

const CONFIG: &str = include_str!("../../.config/config.json5");

/// Environment overrides look like `NAVIGATOR__ROUTER__PENDING_WARN_THRESHOLD=64`
const ENV_PREFIX: &str = "NAVIGATOR";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RouterConfig {
    #[serde(default = "RouterConfig::default_main_thread_name")]
    pub main_thread_name: String,
    #[serde(default = "RouterConfig::default_skip_duplicate_destination")]
    pub skip_duplicate_destination: bool,
    #[serde(default = "RouterConfig::default_pending_warn_threshold")]
    pub pending_warn_threshold: usize,
}

impl RouterConfig {
    fn default_main_thread_name() -> String {
        "navigator-main".to_string()
    }

    fn default_skip_duplicate_destination() -> bool {
        true
    }

    fn default_pending_warn_threshold() -> usize {
        32
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            main_thread_name: Self::default_main_thread_name(),
            skip_duplicate_destination: Self::default_skip_duplicate_destination(),
            pending_warn_threshold: Self::default_pending_warn_threshold(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
}

impl Config {
    /// The defaults shipped with the crate
    pub fn embedded() -> Result<Self, ConfigError> {
        json5::from_str(CONFIG)
            .map_err(|e| ConfigError::Message(format!("Failed to load default config: {e}")))
    }

    /// Embedded defaults, overlaid by config files in the config directory and
    /// then by environment variables
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_from(&utils::get_config_dir())
    }

    pub fn load_from(config_dir: &Path) -> Result<Self, ConfigError> {
        // Validate the embedded file before layering on top of it
        Self::embedded()?;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5));

        let config_files = [
            ("config.json5", config::FileFormat::Json5),
            ("config.json", config::FileFormat::Json),
            ("config.yaml", config::FileFormat::Yaml),
            ("config.toml", config::FileFormat::Toml),
            ("config.ini", config::FileFormat::Ini),
        ];
        let mut found_config = false;
        for (file, format) in &config_files {
            builder = builder.add_source(
                config::File::from(config_dir.join(file))
                    .format(*format)
                    .required(false),
            );
            if config_dir.join(file).exists() {
                found_config = true
            }
        }
        if !found_config {
            log::debug!(
                "No configuration file in {}; using defaults",
                config_dir.display()
            );
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
