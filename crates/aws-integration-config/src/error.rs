use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "Configuration file not found. Looked in:\n\
        - AWS_INTEGRATION_CONFIG_PATH\n\
        - current directory: aws-integration.yaml\n\
        - ./.aws-integration/aws-integration.yaml\n\
        - ~/.config/aws-integration/aws-integration.yaml"
    )]
    ConfigFileNotFound,

    #[error("Invalid configuration file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
