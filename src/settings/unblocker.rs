use serde::Deserialize;
use std::env;
use super::{server::parse_env_var, SettingsError};
use crate::config::UnblockerConfig;

/// 파일/환경 변수로 지정할 수 있는 프록시 옵션. 비워 둔 항목은 기본값을 씁니다.
///
/// 사용자 미들웨어는 코드로만 추가할 수 있습니다.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UnblockerSettings {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub standard_middleware: Option<bool>,
    #[serde(default)]
    pub client_scripts: Option<bool>,
    #[serde(default)]
    pub process_content_types: Option<Vec<String>>,
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn optional_bool(name: &str) -> Result<Option<bool>, SettingsError> {
    if env::var(name).is_err() {
        return Ok(None);
    }
    parse_env_var::<bool, _>(name, || false).map(Some)
}

impl UnblockerSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let settings = Self {
            prefix: optional_env("PROXY_PREFIX"),
            host: optional_env("PROXY_HOST"),
            scheme: optional_env("PROXY_SCHEME"),
            standard_middleware: optional_bool("PROXY_STANDARD_MIDDLEWARE")?,
            client_scripts: optional_bool("PROXY_CLIENT_SCRIPTS")?,
            process_content_types: optional_env("PROXY_CONTENT_TYPES").map(|types| {
                types
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            }),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(scheme) = &self.scheme {
            if !matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https") {
                return Err(SettingsError::InvalidConfig(format!(
                    "scheme은 http 또는 https여야 합니다: {}",
                    scheme
                )));
            }
        }
        if let Some(host) = &self.host {
            if host.contains('/') || host.chars().any(char::is_whitespace) {
                return Err(SettingsError::InvalidConfig(format!(
                    "host에는 경로나 공백이 올 수 없습니다: {}",
                    host
                )));
            }
        }
        Ok(())
    }

    pub fn into_config(self) -> UnblockerConfig {
        UnblockerConfig {
            prefix: self.prefix,
            host: self.host,
            scheme: self.scheme,
            standard_middleware: self.standard_middleware,
            client_scripts: self.client_scripts,
            process_content_types: self.process_content_types,
            ..UnblockerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_scheme() {
        let mut settings = UnblockerSettings {
            scheme: Some("HTTPS".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_ok());

        settings.scheme = Some("ftp".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_host() {
        let settings = UnblockerSettings {
            host: Some("proxy.example.org/path".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_into_config_keeps_unset_fields_empty() {
        let config = UnblockerSettings {
            prefix: Some("browse".to_string()),
            ..Default::default()
        }
        .into_config();

        assert_eq!(config.prefix.as_deref(), Some("browse"));
        assert_eq!(config.host, None);
        assert_eq!(config.standard_middleware, None);
        assert!(config.request_middleware.is_empty());
    }
}
