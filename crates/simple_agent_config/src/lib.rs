#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![deny(unused_features)]
#![warn(unused_crate_dependencies)]

pub mod args;
pub mod file;

use std::{fmt, path::Path, time::Duration};

use args::AgentModeArgs;
use error_stack::{Result, ResultExt};
use model::PermissionOptions;
use url::Url;

use self::file::{AgentConfigFile, TileMapConfig};

pub use self::file::ConfigFileError;

const DEFAULT_EXCHANGE_TIMEOUT_SECONDS: u64 = 20;

#[derive(thiserror::Error, Debug)]
pub enum GetConfigError {
    #[error("Get working directory error")]
    GetWorkingDir,
    #[error("File loading failed")]
    LoadFileError,
    #[error("Invalid configuration")]
    InvalidConfiguration,
    #[error("Tile map API key reading failed")]
    ReadTileMapApiKey,
}

/// API key for an external service.
///
/// The value is deployment time configuration and must stay out of
/// logs, so [fmt::Debug] does not reveal it.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    key: String,
}

impl ApiKey {
    pub fn new(key: String) -> Self {
        Self { key }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey")
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    file: AgentConfigFile,

    /// Agent version with build info.
    agent_code_version: String,
    /// Semver version of the agent.
    agent_semver_version: String,

    tile_map_api_key: Option<ApiKey>,
}

impl AgentConfig {
    /// Agent should run in debug mode.
    ///
    /// Debug mode changes:
    /// * Debug mode warning is logged on startup.
    pub fn debug_mode(&self) -> bool {
        self.file.general.debug.unwrap_or(false)
    }

    pub fn log_timestamp(&self) -> bool {
        self.file.general.log_timestamp.unwrap_or(true)
    }

    pub fn platform_base_url(&self) -> &Url {
        &self.file.platform.base_url
    }

    pub fn permission_options(&self) -> PermissionOptions {
        self.file.platform.permission
    }

    pub fn token_service_url(&self) -> &Url {
        &self.file.messaging.token_service_url
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(
            self.file
                .messaging
                .request_timeout_seconds
                .unwrap_or(DEFAULT_EXCHANGE_TIMEOUT_SECONDS),
        )
    }

    pub fn tile_map(&self) -> Option<&TileMapConfig> {
        self.file.tile_map.as_ref()
    }

    pub fn tile_map_api_key(&self) -> Option<&ApiKey> {
        self.tile_map_api_key.as_ref()
    }

    pub fn agent_code_version(&self) -> &str {
        &self.agent_code_version
    }

    pub fn agent_semver_version(&self) -> &str {
        &self.agent_semver_version
    }

    pub fn parsed_file(&self) -> &AgentConfigFile {
        &self.file
    }
}

/// Read config file from the config directory or current directory.
pub fn get_config(
    args_config: AgentModeArgs,
    agent_code_version: String,
    agent_semver_version: String,
) -> Result<AgentConfig, GetConfigError> {
    let config_dir = if let Some(dir) = args_config.config_dir {
        dir
    } else {
        std::env::current_dir().change_context(GetConfigError::GetWorkingDir)?
    };

    let file_config =
        file::AgentConfigFile::load(config_dir).change_context(GetConfigError::LoadFileError)?;

    if file_config.platform.base_url.cannot_be_a_base() {
        return Err(GetConfigError::InvalidConfiguration)
            .attach_printable("Platform base URL cannot be used as a base URL");
    }

    if file_config.messaging.token_service_url.cannot_be_a_base() {
        return Err(GetConfigError::InvalidConfiguration)
            .attach_printable("Messaging token service URL cannot be used as a base URL");
    }

    if let Some(0) = file_config.messaging.request_timeout_seconds {
        return Err(GetConfigError::InvalidConfiguration)
            .attach_printable("Messaging request timeout must not be zero");
    }

    let tile_map_api_key = if let Some(config) = file_config.tile_map.as_ref() {
        Some(load_tile_map_api_key(&config.api_key_path)?)
    } else {
        None
    };

    let config = AgentConfig {
        file: file_config,
        agent_code_version,
        agent_semver_version,
        tile_map_api_key,
    };

    Ok(config)
}

fn load_tile_map_api_key(path: &Path) -> Result<ApiKey, GetConfigError> {
    if !path.exists() {
        return Err(GetConfigError::InvalidConfiguration)
            .attach_printable("Tile map API key file does not exist");
    }

    let key = std::fs::read_to_string(path)
        .change_context(GetConfigError::ReadTileMapApiKey)?
        .trim()
        .to_string();

    if key.is_empty() {
        return Err(GetConfigError::InvalidConfiguration)
            .attach_printable("Tile map API key file is empty");
    }

    Ok(ApiKey::new(key))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{AgentConfig, ApiKey};
    use crate::file::DEFAULT_CONFIG_FILE_TEXT;

    fn default_config() -> AgentConfig {
        AgentConfig {
            file: toml::from_str(DEFAULT_CONFIG_FILE_TEXT).unwrap(),
            agent_code_version: String::new(),
            agent_semver_version: String::new(),
            tile_map_api_key: None,
        }
    }

    #[test]
    fn api_key_debug_output_does_not_reveal_the_key() {
        let key = ApiKey::new("secret-value".to_string());
        let debug_output = format!("{:?}", key);
        assert!(!debug_output.contains("secret-value"));
    }

    #[test]
    fn exchange_timeout_defaults_to_twenty_seconds() {
        assert_eq!(default_config().exchange_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn missing_tile_map_api_key_file_is_rejected() {
        let result = super::load_tile_map_api_key(std::path::Path::new(
            "tile-map-api-key-file-which-does-not-exist",
        ));
        assert!(result.is_err());
    }
}
