use docfence_engine::{FenceSyntax, Namespace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "docfence.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Invalid fixture '{name}': {reason}")]
    InvalidFixture { name: String, reason: String },
}

/// Optional Markdown syntax extensions understood while looking for fences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkdownExtension {
    Tables,
    Footnotes,
    Strikethrough,
    Tasklists,
    SmartPunctuation,
}

/// A fixture defined in the config file: a fixed value, or a shell command
/// whose standard output (parsed as JSON when possible) becomes the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureConfig {
    pub value: Option<serde_json::Value>,
    pub command: Option<String>,
    /// Run after every item that used the fixture.
    pub teardown: Option<String>,
    pub autouse: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub enabled: bool,
    pub syntax: FenceSyntax,
    pub python: String,
    pub exclude: Vec<String>,
    pub markdown_extensions: Vec<MarkdownExtension>,
    /// Further TOML files of globals, applied after `globals` in order.
    pub globals_files: Vec<PathBuf>,
    pub globals: Namespace,
    pub fixtures: BTreeMap<String, FixtureConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            syntax: FenceSyntax::Default,
            python: docfence_engine::runner::DEFAULT_INTERPRETER.to_string(),
            exclude: Vec::new(),
            markdown_extensions: Vec::new(),
            globals_files: Vec::new(),
            globals: Namespace::new(),
            fixtures: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the interpreter and globals files
        config.python = Self::expand(&config.python).unwrap_or(config.python);
        config.globals_files = config
            .globals_files
            .into_iter()
            .map(|path| Self::expand_path(&path).unwrap_or(path))
            .collect();

        config.validate()?;
        Ok(Some(config))
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Load `docfence.toml` from `dir`, falling back to defaults.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        Ok(Self::load_from_path(Self::config_path(dir))?.unwrap_or_default())
    }

    pub fn config_path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE_NAME)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.exclude_patterns()?;
        for (name, fixture) in &self.fixtures {
            let reason = match (&fixture.value, &fixture.command) {
                (Some(_), Some(_)) => "set either 'value' or 'command', not both",
                (None, None) => "one of 'value' or 'command' is required",
                (Some(_), None) if fixture.teardown.is_some() => {
                    "'teardown' needs a 'command' fixture"
                }
                _ => continue,
            };
            return Err(ConfigError::InvalidFixture {
                name: name.clone(),
                reason: reason.to_string(),
            });
        }
        Ok(())
    }

    pub fn exclude_patterns(&self) -> Result<Vec<glob::Pattern>, ConfigError> {
        self.exclude
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Global sets in the order they apply: inline `globals` first, then
    /// each of `globals_files` resolved against `base_dir`.
    pub fn global_sets(&self, base_dir: &Path) -> Result<Vec<Namespace>, ConfigError> {
        let mut sets = vec![self.globals.clone()];
        for file in &self.globals_files {
            let config_path = base_dir.join(file);
            let content = std::fs::read_to_string(&config_path).map_err(|source| {
                ConfigError::ConfigReadError {
                    config_path: config_path.clone(),
                    source,
                }
            })?;
            let set: Namespace =
                toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                    config_path: config_path.clone(),
                    source,
                })?;
            sets.push(set);
        }
        Ok(sets)
    }

    fn expand(value: &str) -> Option<String> {
        shellexpand::full(value).ok().map(|expanded| expanded.into_owned())
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
