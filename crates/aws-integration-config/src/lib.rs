pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing directly at a configuration file
pub const CONFIG_PATH_ENV: &str = "AWS_INTEGRATION_CONFIG_PATH";

const APP_DIR: &str = "aws-integration";
const CONFIG_FILE: &str = "aws-integration.yaml";
const LOCAL_DIR: &str = ".aws-integration";
const STATE_FILE: &str = "unitdata.json";
const DEFAULT_ENDPOINT: &str = "aws";

/// Settings of the integration interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IntegrationConfig {
    /// Relation endpoint name; prefixes flags and store keys
    pub endpoint_name: String,

    /// Acknowledgement store file; defaults to the state directory
    pub state_file: Option<PathBuf>,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            endpoint_name: DEFAULT_ENDPOINT.to_string(),
            state_file: None,
        }
    }
}

impl IntegrationConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the first configuration file found, or the defaults when there is none
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Ok(path) => Self::from_file(path),
            Err(ConfigError::ConfigFileNotFound) => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Resolved path of the acknowledgement store
    pub fn state_file_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(path.clone()),
            None => Ok(get_state_dir()?.join(STATE_FILE)),
        }
    }
}

/// Configuration directory (`~/.config/aws-integration`), created if missing
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(APP_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// State directory (`~/.local/share/aws-integration`), created if missing
pub fn get_state_dir() -> Result<PathBuf> {
    let state_dir = dirs::data_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(APP_DIR);

    if !state_dir.exists() {
        std::fs::create_dir_all(&state_dir)?;
    }

    Ok(state_dir)
}

/// Locate the configuration file.
///
/// Search order:
/// 1. `AWS_INTEGRATION_CONFIG_PATH`
/// 2. `./aws-integration.yaml`
/// 3. `./.aws-integration/aws-integration.yaml`
/// 4. `~/.config/aws-integration/aws-integration.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    let path = current_dir.join(CONFIG_FILE);
    if path.exists() {
        return Ok(path);
    }

    let path = current_dir.join(LOCAL_DIR).join(CONFIG_FILE);
    if path.exists() {
        return Ok(path);
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join(CONFIG_FILE);
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = IntegrationConfig::default();
        assert_eq!(config.endpoint_name, "aws");
        assert!(config.state_file.is_none());
    }

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with(APP_DIR));
        assert!(config_dir.is_dir());
    }

    #[test]
    fn test_get_state_dir() {
        let state_dir = get_state_dir().unwrap();
        assert!(state_dir.ends_with(APP_DIR));
        assert_eq!(
            IntegrationConfig::default().state_file_path().unwrap(),
            state_dir.join(STATE_FILE)
        );
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "endpoint-name: aws-integration\nstate-file: /var/lib/aws/unitdata.json\n",
        )
        .unwrap();

        let config = IntegrationConfig::from_file(&path).unwrap();
        assert_eq!(config.endpoint_name, "aws-integration");
        assert_eq!(
            config.state_file_path().unwrap(),
            PathBuf::from("/var/lib/aws/unitdata.json")
        );
    }

    #[test]
    fn test_from_file_partial_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "state-file: ./state.json\n").unwrap();

        let config = IntegrationConfig::from_file(&path).unwrap();
        assert_eq!(config.endpoint_name, "aws");
    }

    #[test]
    fn test_from_file_invalid() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "endpoint-name: [unclosed\n").unwrap();

        let result = IntegrationConfig::from_file(&path);
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join(CONFIG_FILE), "endpoint-name: aws\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file().unwrap();
        assert!(result.ends_with(CONFIG_FILE));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_local_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let local_dir = temp_dir.path().join(LOCAL_DIR);
        fs::create_dir(&local_dir).unwrap();
        fs::write(local_dir.join(CONFIG_FILE), "endpoint-name: aws\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file().unwrap();
        assert!(result.ends_with(".aws-integration/aws-integration.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "endpoint-name: custom\n").unwrap();

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        }

        let result = find_config_file().unwrap();
        assert_eq!(result, config_path);
        assert_eq!(IntegrationConfig::load().unwrap().endpoint_name, "custom");

        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
    }
}
