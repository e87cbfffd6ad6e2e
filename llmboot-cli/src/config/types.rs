use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawBootstrapConfig {
    #[serde(default)]
    pub runtime: RawRuntimeConfig,

    #[serde(default)]
    pub model: RawModelConfig,

    #[serde(default)]
    pub dependencies: RawDependencyConfig,

    #[serde(default)]
    pub app: RawAppConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRuntimeConfig {
    pub binary: Option<String>,
    pub install_script_url: Option<String>,
    pub host: Option<String>,

    #[serde(default, with = "humantime_serde")]
    pub ready_timeout: Option<Duration>,

    #[serde(default, with = "humantime_serde")]
    pub ready_interval: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawModelConfig {
    pub name: Option<String>,
    pub verify: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDependencyConfig {
    pub installer: Option<String>,
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAppConfig {
    pub data_dirs: Option<Vec<PathBuf>>,
    pub run_command: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_config_partial_parsing() {
        let toml_str = r#"
[model]
name = "llama3.1:8b"
"#;
        let raw: RawBootstrapConfig = toml::from_str(toml_str).unwrap();

        // Only model.name was set, everything else stays None
        assert_eq!(raw.model.name, Some("llama3.1:8b".to_string()));
        assert!(raw.model.verify.is_none());
        assert!(raw.runtime.binary.is_none());
        assert!(raw.dependencies.manifest.is_none());
    }

    #[test]
    fn test_raw_config_empty_uses_none() {
        let raw: RawBootstrapConfig = toml::from_str("").unwrap();

        assert!(raw.runtime.host.is_none());
        assert!(raw.runtime.ready_timeout.is_none());
        assert!(raw.app.data_dirs.is_none());
        assert!(raw.app.run_command.is_none());
    }

    #[test]
    fn test_raw_config_parses_durations() {
        let toml_str = r#"
[runtime]
ready_timeout = "1m"
ready_interval = "250ms"
"#;
        let raw: RawBootstrapConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(raw.runtime.ready_timeout, Some(Duration::from_secs(60)));
        assert_eq!(raw.runtime.ready_interval, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_raw_config_rejects_bad_duration() {
        let toml_str = r#"
[runtime]
ready_timeout = "soon"
"#;
        assert!(toml::from_str::<RawBootstrapConfig>(toml_str).is_err());
    }
}
