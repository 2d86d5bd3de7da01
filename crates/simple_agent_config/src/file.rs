//! Config file

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use error_stack::{Report, Result, ResultExt};
use model::PermissionOptions;
use serde::{Deserialize, Serialize};
use url::Url;

pub const CONFIG_FILE_NAME: &str = "agent_config.toml";

pub const DEFAULT_CONFIG_FILE_TEXT: &str = r#"

# [general]
# debug = false
# log_timestamp = true

[platform]
base_url = "http://127.0.0.1:3100"

# [platform.permission]
# alert = true
# badge = true
# sound = true

[messaging]
token_service_url = "http://127.0.0.1:3200"
# request_timeout_seconds = 20 # optional

# [tile_map]
# api_key_path = "tile_map_api_key"

"#;

#[derive(thiserror::Error, Debug)]
pub enum ConfigFileError {
    #[error("Save config file failed")]
    Save,
    #[error("Save default")]
    SaveDefault,
    #[error("Not a directory")]
    NotDirectory,
    #[error("Load config file")]
    LoadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfigFile {
    #[serde(default)]
    pub general: GeneralConfig,

    pub platform: PlatformConfig,
    pub messaging: MessagingConfig,
    pub tile_map: Option<TileMapConfig>,
}

impl AgentConfigFile {
    pub fn load(dir: impl AsRef<Path>) -> Result<AgentConfigFile, ConfigFileError> {
        let config_string =
            ConfigFileUtils::load_string(dir, CONFIG_FILE_NAME, DEFAULT_CONFIG_FILE_TEXT)?;
        toml::from_str(&config_string).change_context(ConfigFileError::LoadConfig)
    }
}

pub struct ConfigFileUtils;

impl ConfigFileUtils {
    pub fn save_string(file_path: impl AsRef<Path>, text: &str) -> Result<(), ConfigFileError> {
        let mut file = std::fs::File::create(file_path).change_context(ConfigFileError::Save)?;
        file.write_all(text.as_bytes())
            .change_context(ConfigFileError::Save)?;
        Ok(())
    }

    pub fn join_dir_path_and_file_name(
        dir: impl AsRef<Path>,
        file_name: &str,
    ) -> Result<PathBuf, ConfigFileError> {
        if !dir.as_ref().is_dir() {
            return Err(Report::new(ConfigFileError::NotDirectory));
        }
        let mut file_path = dir.as_ref().to_path_buf();
        file_path.push(file_name);
        Ok(file_path)
    }

    pub fn load_string(
        dir: impl AsRef<Path>,
        file_name: &str,
        default: &str,
    ) -> Result<String, ConfigFileError> {
        let file_path = Self::join_dir_path_and_file_name(&dir, file_name)
            .change_context(ConfigFileError::LoadConfig)?;
        if !file_path.exists() {
            Self::save_string(&file_path, default).change_context(ConfigFileError::SaveDefault)?;
        }

        std::fs::read_to_string(&file_path).change_context(ConfigFileError::LoadConfig)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub debug: Option<bool>,
    /// Write timestamp to log messages. Enabled by default.
    pub log_timestamp: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    /// Base URL for platform permission and push registration services.
    pub base_url: Url,
    /// Notification authorization options requested at launch.
    #[serde(default)]
    pub permission: PermissionOptions,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagingConfig {
    /// Base URL for the messaging backend token service.
    pub token_service_url: Url,
    /// Bounded timeout for one token exchange request.
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TileMapConfig {
    /// Path to a file containing the tile map provider API key.
    pub api_key_path: PathBuf,
}
