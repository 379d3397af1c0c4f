use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::storage::DEFAULT_STORAGE_KEY;
use crate::view::{SortOption, ViewMode};

const CONFIG_FILE: &str = "config.toml";
const APP_DIR_NAME: &str = "study_planner";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
	pub storage_key: String,
	pub view_mode: ViewMode,
	pub sort_option: SortOption,
	pub auto_sort: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			storage_key: DEFAULT_STORAGE_KEY.to_string(),
			view_mode: ViewMode::List,
			sort_option: SortOption::Due,
			auto_sort: true,
		}
	}
}

impl Config {
	pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
		let path = data_dir.join(CONFIG_FILE);
		let raw = match fs::read_to_string(&path) {
			Ok(raw) => raw,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
			Err(source) => return Err(ConfigError::Io { path, source }),
		};

		let mut config: Config =
			toml::from_str(&raw).map_err(|source| ConfigError::TomlDecode { path, source })?;
		if config.storage_key.trim().is_empty() {
			config.storage_key = DEFAULT_STORAGE_KEY.to_string();
		}
		Ok(config)
	}
}

pub fn resolve_data_dir(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = env::var_os("STUDY_PLANNER_DIR") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return absolutize(path);
		}
	}

	default_data_dir()
}

fn default_data_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR_NAME);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR_NAME);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(".local").join("state").join(APP_DIR_NAME);
	}

	PathBuf::from(format!(".{APP_DIR_NAME}"))
}

fn absolutize(path: PathBuf) -> PathBuf {
	if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	}
}

#[cfg(test)]
mod tests {
	use std::fs;
	use std::path::PathBuf;

	use super::{Config, resolve_data_dir};
	use crate::error::ConfigError;
	use crate::view::{SortOption, ViewMode};

	fn temp_dir(name: &str) -> PathBuf {
		let mut path = std::env::temp_dir();
		path.push(format!("{}_{}", name, std::process::id()));
		fs::create_dir_all(&path).expect("temp dir");
		path
	}

	#[test]
	fn missing_config_uses_defaults() {
		let dir = temp_dir("study_planner_config_missing");
		assert_eq!(Config::load(&dir).unwrap(), Config::default());
		let _ = fs::remove_dir_all(dir);
	}

	#[test]
	fn partial_config_overrides_only_given_keys() {
		let dir = temp_dir("study_planner_config_partial");
		fs::write(dir.join("config.toml"), "view_mode = \"month\"\nauto_sort = false\n").unwrap();

		let config = Config::load(&dir).unwrap();
		assert_eq!(config.view_mode, ViewMode::Month);
		assert!(!config.auto_sort);
		assert_eq!(config.sort_option, SortOption::Due);
		assert_eq!(config.storage_key, "study-planner-data");
		let _ = fs::remove_dir_all(dir);
	}

	#[test]
	fn invalid_config_is_an_error() {
		let dir = temp_dir("study_planner_config_invalid");
		fs::write(dir.join("config.toml"), "sort_option = \"alphabetical\"\n").unwrap();
		assert!(matches!(Config::load(&dir), Err(ConfigError::TomlDecode { .. })));
		let _ = fs::remove_dir_all(dir);
	}

	#[test]
	fn explicit_data_dir_wins() {
		let dir = std::env::temp_dir().join("explicit_planner_dir");
		assert_eq!(resolve_data_dir(Some(dir.clone())), dir);
	}
}
