use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to encode planner data: {0}")]
	Encode(#[source] serde_json::Error),

	#[error("failed to parse stored planner data: {0}")]
	MalformedPersistedState(#[source] serde_json::Error),

	#[error("import file is not a valid planner document: {0}")]
	MalformedImport(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config {path}: {source}")]
	TomlDecode {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
}
