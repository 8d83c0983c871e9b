//! Configuration loading and management

use anyhow::{Context, Result};
use labkit_domain::progress::ProgressStyle;
use labkit_domain::{ContainerTagging, DEFAULT_HEX_LENGTH, HashOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub hash: HashConfig,

    #[serde(default)]
    pub bench: BenchConfig,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub about: AboutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashConfig {
    #[serde(default = "default_hex_length")]
    pub hex_length: usize,

    #[serde(default)]
    pub container_tagging: ContainerTagging,

    #[serde(default)]
    pub raise_on_unknown: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_repeat")]
    pub repeat: usize,

    #[serde(default)]
    pub number: Option<u64>,

    #[serde(default)]
    pub progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_width")]
    pub width: usize,

    #[serde(default = "default_decimals")]
    pub decimals: usize,

    #[serde(default = "default_fill")]
    pub fill: char,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AboutConfig {
    #[serde(default = "default_git_excludes")]
    pub git_excludes: Vec<String>,

    #[serde(default = "default_git_timeout")]
    pub git_timeout_secs: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_hex_length() -> usize {
    DEFAULT_HEX_LENGTH
}

fn default_repeat() -> usize {
    7
}

fn default_width() -> usize {
    20
}

fn default_decimals() -> usize {
    1
}

fn default_fill() -> char {
    '█'
}

fn default_git_excludes() -> Vec<String> {
    vec![":!*.tex".to_string(), ":!*.bib".to_string()]
}

fn default_git_timeout() -> u64 {
    10
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            hex_length: default_hex_length(),
            container_tagging: ContainerTagging::default(),
            raise_on_unknown: false,
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            repeat: default_repeat(),
            number: None,
            progress: false,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            decimals: default_decimals(),
            fill: default_fill(),
        }
    }
}

impl Default for AboutConfig {
    fn default() -> Self {
        Self {
            git_excludes: default_git_excludes(),
            git_timeout_secs: default_git_timeout(),
        }
    }
}

impl HashConfig {
    pub fn options(&self) -> HashOptions {
        HashOptions {
            hex_length: self.hex_length,
            raw: false,
            raise_on_unknown: self.raise_on_unknown,
            containers: self.container_tagging,
        }
    }
}

impl ProgressConfig {
    pub fn style(&self) -> ProgressStyle {
        ProgressStyle {
            decimals: self.decimals,
            width: self.width,
            fill: self.fill,
            ..ProgressStyle::default()
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./labkit.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("LABKIT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# labkit configuration

[general]
log_level = "info"

[hash]
# Hex characters printed by `labkit hash` (at most 128)
hex_length = 8
container_tagging = "untagged"  # untagged, tagged
raise_on_unknown = false

[bench]
repeat = 7
# number = 1000  # runs per repeat, auto-ranged when unset
progress = false

[progress]
width = 20
decimals = 1
fill = "█"

[about]
git_excludes = [":!*.tex", ":!*.bib"]
git_timeout_secs = 10
"#
        .to_string()
    }
}
