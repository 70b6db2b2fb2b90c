use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{MAX_MINUTES, MIN_MINUTES};

const APP_DIR: &str = "cycle_timer";
const CONFIG_FILE: &str = "config.toml";
pub const LOG_FILE: &str = "cycle-timer.log";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse config {}: {source}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	#[error("default_minutes must be within 5..=60, got {0}")]
	DefaultMinutes(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub state_dir: Option<PathBuf>,
	pub default_minutes: u32,
	pub minutes_step: u32,
	pub task_suggestions: Vec<String>,
	pub log_filter: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			state_dir: None,
			default_minutes: 25,
			minutes_step: 5,
			task_suggestions: Vec::new(),
			log_filter: "cycle_timer=info".to_string(),
		}
	}
}

impl Config {
	/// Missing file means defaults; a file that exists must parse.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let raw = match fs::read_to_string(path) {
			Ok(raw) => raw,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
			Err(source) => {
				return Err(ConfigError::Read {
					path: path.to_path_buf(),
					source,
				});
			}
		};
		Self::from_toml(&raw).map_err(|err| match err {
			ConfigError::Parse { source, .. } => ConfigError::Parse {
				path: path.to_path_buf(),
				source,
			},
			other => other,
		})
	}

	pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(raw).map_err(|source| ConfigError::Parse {
			path: PathBuf::new(),
			source,
		})?;
		if !(MIN_MINUTES..=MAX_MINUTES).contains(&config.default_minutes) {
			return Err(ConfigError::DefaultMinutes(config.default_minutes));
		}
		Ok(config)
	}

	pub fn minutes_step(&self) -> u32 {
		self.minutes_step.max(1)
	}
}

pub fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return path;
	}

	if let Some(path) = non_empty_env("CYCLE_TIMER_CONFIG") {
		return path;
	}

	config_dir().join(CONFIG_FILE)
}

pub fn resolve_state_dir(cli_dir: Option<PathBuf>, config: &Config) -> PathBuf {
	if let Some(path) = cli_dir {
		return path;
	}

	if let Some(path) = non_empty_env("CYCLE_TIMER_STATE_DIR") {
		return path;
	}

	if let Some(path) = &config.state_dir {
		return path.clone();
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = non_empty_env("XDG_STATE_HOME") {
		return path.join(APP_DIR);
	}

	if let Some(path) = non_empty_env("HOME") {
		return path.join(".local").join("state").join(APP_DIR);
	}

	PathBuf::from(".cycle_timer")
}

fn config_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("APPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = non_empty_env("XDG_CONFIG_HOME") {
		return path.join(APP_DIR);
	}

	if let Some(path) = non_empty_env("HOME") {
		return path.join(".config").join(APP_DIR);
	}

	PathBuf::from(".cycle_timer")
}

fn non_empty_env(name: &str) -> Option<PathBuf> {
	env::var_os(name)
		.filter(|value| !value.is_empty())
		.map(PathBuf::from)
}
