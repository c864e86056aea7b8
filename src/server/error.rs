use std::fmt;

use crate::config::ConfigError;
use crate::settings::SettingsError;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    SettingsError(SettingsError),
    ConfigError(ConfigError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<SettingsError> for Error {
    fn from(err: SettingsError) -> Self {
        Error::SettingsError(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::ConfigError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO Error: {}", e),
            Error::SettingsError(e) => write!(f, "Settings Error: {}", e),
            Error::ConfigError(e) => write!(f, "Config Error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::SettingsError(e) => Some(e),
            Error::ConfigError(e) => Some(e),
        }
    }
}
