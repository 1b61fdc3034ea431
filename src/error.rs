use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: io::Error,
    },
    #[error("Config file error: {source}")]
    ConfigParseError {
        #[from]
        source: figment::Error,
    },
    #[error("Failed to watch file: {source}")]
    WatchError {
        #[from]
        source: notify::Error,
    },
    #[error("Yaml parse error: {source}")]
    YamlParseError {
        #[from]
        source: serde_yaml::Error,
    },
    #[error("Docker daemon error: {source}")]
    DockerError {
        #[from]
        source: bollard::errors::Error,
    },
    #[error("File {file} is an invalid type")]
    FileTypeError { file: PathBuf },
    #[error("Hosts file is invalid: {message}")]
    ConfigInvalid { message: String },
    #[error("Unknown host '{alias}'")]
    UnknownHost { alias: String },
}
