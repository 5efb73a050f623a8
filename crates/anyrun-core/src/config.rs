use crate::types::AppDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "anyrun.toml";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/anyrun/anyrun.toml";
pub const CONFIG_ENV: &str = "ANYRUN_CONFIG";
pub const DEFAULT_UI_PORT: u16 = 5173;

// ── anyrun.toml ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
	#[serde(default = "default_ui_port", rename = "uiPort", alias = "ui_port")]
	pub ui_port: u16,
	#[serde(default = "default_user", skip_serializing_if = "Option::is_none")]
	pub user: Option<UserConfig>,
	#[serde(default)]
	pub apps: Vec<AppDescriptor>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			ui_port: default_ui_port(),
			user: default_user(),
			apps: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
	#[serde(default = "default_username")]
	pub username: String,
	#[serde(default, rename = "passwordHash", alias = "password_hash")]
	pub password_hash: String,
	#[serde(default = "default_true", rename = "firstLogin", alias = "first_login")]
	pub first_login: bool,
}

impl Default for UserConfig {
	fn default() -> Self {
		Self {
			username: default_username(),
			password_hash: String::new(),
			first_login: true,
		}
	}
}

fn default_ui_port() -> u16 { DEFAULT_UI_PORT }
fn default_user() -> Option<UserConfig> { Some(UserConfig::default()) }
fn default_username() -> String { "admin".into() }
fn default_true() -> bool { true }

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse {}: {source}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	#[error("failed to serialize config: {0}")]
	Serialize(#[from] toml::ser::Error),
	#[error("failed to write {}: {source}", path.display())]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

impl Config {
	pub fn find_app(&self, name: &str) -> Option<&AppDescriptor> {
		self.apps.iter().find(|app| app.name == name)
	}

	pub fn autostart_apps(&self) -> impl Iterator<Item = &AppDescriptor> {
		self.apps.iter().filter(|app| app.autostart)
	}

	/// Drops nameless apps and later duplicates of an already seen name.
	pub fn normalize(&mut self) {
		let mut seen = HashSet::new();
		self.apps.retain(|app| {
			if app.name.is_empty() {
				tracing::warn!("skipping app without a name (path: {:?})", app.path);
				return false;
			}
			if !seen.insert(app.name.clone()) {
				tracing::warn!("skipping duplicate app definition: {}", app.name);
				return false;
			}
			true
		});
	}
}

/// Picks the config file: explicit path, then `$ANYRUN_CONFIG`, then
/// `./anyrun.toml`, then `/etc/anyrun/anyrun.toml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
	let env = std::env::var(CONFIG_ENV).ok().filter(|v| !v.is_empty());
	let candidates = [PathBuf::from(CONFIG_FILE_NAME), PathBuf::from(SYSTEM_CONFIG_PATH)];
	pick_config_path(explicit, env.as_deref(), &candidates)
}

fn pick_config_path(explicit: Option<&Path>, env: Option<&str>, candidates: &[PathBuf]) -> PathBuf {
	if let Some(path) = explicit {
		return path.to_path_buf();
	}
	if let Some(path) = env {
		return PathBuf::from(path);
	}
	candidates
		.iter()
		.find(|p| p.exists())
		.or_else(|| candidates.first())
		.cloned()
		.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
	let mut config: Config = toml::from_str(content)?;
	config.normalize();
	Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
	let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
		path: path.to_path_buf(),
		source,
	})?;
	let config = parse_config(&content).map_err(|source| ConfigError::Parse {
		path: path.to_path_buf(),
		source,
	})?;
	tracing::debug!("loaded {} apps from {}", config.apps.len(), path.display());
	Ok(config)
}

pub fn load_or_default(path: &Path) -> Config {
	match load_config(path) {
		Ok(config) => config,
		Err(e) => {
			tracing::warn!("{}; using default config", e);
			Config::default()
		}
	}
}

pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
	let content = toml::to_string_pretty(config)?;
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
			path: parent.to_path_buf(),
			source,
		})?;
	}
	std::fs::write(path, content).map_err(|source| ConfigError::Write {
		path: path.to_path_buf(),
		source,
	})
}
