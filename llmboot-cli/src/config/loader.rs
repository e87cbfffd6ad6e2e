use super::types::{
    RawAppConfig, RawBootstrapConfig, RawDependencyConfig, RawModelConfig, RawRuntimeConfig,
};
use anyhow::{Context, Result, bail};
use llmboot_core::{AppConfig, BootstrapConfig, DependencyConfig, ModelConfig, RuntimeConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the runtime host.
pub const ENV_HOST: &str = "OLLAMA_HOST";

/// Environment variable overriding the model name.
pub const ENV_MODEL: &str = "OLLAMA_MODEL";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + explicit file + environment)
    pub fn load(explicit: Option<&Path>) -> Result<BootstrapConfig> {
        let mut raw = RawBootstrapConfig::default();

        // Layer 1: User config
        let user_path = Self::user_config_path();
        if user_path.exists() {
            debug!(path = %user_path.display(), "Loading user config");
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!(path = %project_path.display(), "Loading project config");
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        // Layer 3: Explicit --config file, which must exist
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            raw = Self::merge_raw(raw, Self::read_raw(path)?);
        }

        // Layer 4: Environment
        raw = Self::apply_env(raw, |key| std::env::var(key).ok());

        Ok(Self::finalize(raw))
    }

    /// Get user config path ($XDG_CONFIG_HOME/llmboot/config.toml)
    pub fn user_config_path() -> PathBuf {
        llmboot_paths::user_config_file()
    }

    /// Get project config path
    /// Can be overridden with LLMBOOT_PROJECT_CONFIG_DIR env var (useful for isolated e2e tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("LLMBOOT_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".llmboot/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawBootstrapConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawBootstrapConfig, overlay: RawBootstrapConfig) -> RawBootstrapConfig {
        RawBootstrapConfig {
            runtime: RawRuntimeConfig {
                binary: overlay.runtime.binary.or(base.runtime.binary),
                install_script_url: overlay
                    .runtime
                    .install_script_url
                    .or(base.runtime.install_script_url),
                host: overlay.runtime.host.or(base.runtime.host),
                ready_timeout: overlay.runtime.ready_timeout.or(base.runtime.ready_timeout),
                ready_interval: overlay.runtime.ready_interval.or(base.runtime.ready_interval),
            },
            model: RawModelConfig {
                name: overlay.model.name.or(base.model.name),
                verify: overlay.model.verify.or(base.model.verify),
            },
            dependencies: RawDependencyConfig {
                installer: overlay.dependencies.installer.or(base.dependencies.installer),
                manifest: overlay.dependencies.manifest.or(base.dependencies.manifest),
            },
            app: RawAppConfig {
                data_dirs: overlay.app.data_dirs.or(base.app.data_dirs),
                run_command: overlay.app.run_command.or(base.app.run_command),
            },
        }
    }

    /// Apply `OLLAMA_HOST` / `OLLAMA_MODEL`. Empty values are ignored.
    fn apply_env<F>(mut raw: RawBootstrapConfig, lookup: F) -> RawBootstrapConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty(ENV_HOST) {
            raw.runtime.host = Some(host);
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            raw.model.name = Some(model);
        }
        raw
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawBootstrapConfig) -> BootstrapConfig {
        let runtime = RuntimeConfig::default();
        let model = ModelConfig::default();
        let dependencies = DependencyConfig::default();
        let app = AppConfig::default();

        BootstrapConfig {
            runtime: RuntimeConfig {
                binary: raw.runtime.binary.unwrap_or(runtime.binary),
                install_script_url: raw
                    .runtime
                    .install_script_url
                    .unwrap_or(runtime.install_script_url),
                host: raw.runtime.host.or(runtime.host),
                ready_timeout: raw.runtime.ready_timeout.unwrap_or(runtime.ready_timeout),
                ready_interval: raw.runtime.ready_interval.unwrap_or(runtime.ready_interval),
            },
            model: ModelConfig {
                name: raw.model.name.unwrap_or(model.name),
                verify: raw.model.verify.unwrap_or(model.verify),
            },
            dependencies: DependencyConfig {
                installer: raw.dependencies.installer.unwrap_or(dependencies.installer),
                manifest: raw.dependencies.manifest.unwrap_or(dependencies.manifest),
            },
            app: AppConfig {
                data_dirs: raw.app.data_dirs.unwrap_or(app.data_dirs),
                run_command: raw.app.run_command.unwrap_or(app.run_command),
            },
        }
    }

    /// Load a single config file without layering (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<BootstrapConfig> {
        if path.exists() {
            Ok(Self::finalize(Self::read_raw(path)?))
        } else {
            Ok(BootstrapConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ==================== Load Tests ====================

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config, BootstrapConfig::default());
    }

    #[test]
    fn test_load_from_valid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[runtime]
host = "http://10.0.0.5:11434"
ready_timeout = "45s"

[model]
name = "llama3.1:8b"
verify = false

[dependencies]
installer = "pip3"
manifest = "deps/requirements.txt"
"#
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.runtime.base_url(), "http://10.0.0.5:11434");
        assert_eq!(config.runtime.ready_timeout, Duration::from_secs(45));
        // Unset values fall back to defaults
        assert_eq!(config.runtime.ready_interval, Duration::from_millis(200));
        assert_eq!(config.model.name, "llama3.1:8b");
        assert!(!config.model.verify);
        assert_eq!(config.dependencies.installer, "pip3");
        assert_eq!(
            config.dependencies.manifest,
            PathBuf::from("deps/requirements.txt")
        );
        assert_eq!(config.app.run_command, "streamlit run app.py");
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();

        let result = ConfigLoader::load_from_path(&path);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_load_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");

        let err = ConfigLoader::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    #[serial]
    fn test_load_layers_project_and_explicit() {
        let temp_dir = TempDir::new().unwrap();
        let project_dir = temp_dir.path().join("project");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(
            project_dir.join("config.toml"),
            "[model]\nname = \"project-model\"\n\n[app]\nrun_command = \"python app.py\"\n",
        )
        .unwrap();
        let explicit = temp_dir.path().join("explicit.toml");
        std::fs::write(&explicit, "[model]\nname = \"explicit-model\"\n").unwrap();

        unsafe {
            std::env::set_var("LLMBOOT_PROJECT_CONFIG_DIR", &project_dir);
            std::env::set_var("XDG_CONFIG_HOME", temp_dir.path().join("xdg"));
            std::env::remove_var(ENV_MODEL);
            std::env::remove_var(ENV_HOST);
        }

        let config = ConfigLoader::load(Some(&explicit)).unwrap();

        unsafe {
            std::env::remove_var("LLMBOOT_PROJECT_CONFIG_DIR");
            std::env::remove_var("XDG_CONFIG_HOME");
        }

        // Explicit file wins over project config, project fills the rest
        assert_eq!(config.model.name, "explicit-model");
        assert_eq!(config.app.run_command, "python app.py");
    }

    #[test]
    #[serial]
    fn test_load_env_overrides_files() {
        let temp_dir = TempDir::new().unwrap();
        let explicit = temp_dir.path().join("explicit.toml");
        std::fs::write(&explicit, "[model]\nname = \"file-model\"\n").unwrap();

        unsafe {
            std::env::set_var("LLMBOOT_PROJECT_CONFIG_DIR", temp_dir.path().join("none"));
            std::env::set_var("XDG_CONFIG_HOME", temp_dir.path().join("xdg"));
            std::env::set_var(ENV_MODEL, "env-model");
            std::env::set_var(ENV_HOST, "0.0.0.0:11500");
        }

        let config = ConfigLoader::load(Some(&explicit)).unwrap();

        unsafe {
            std::env::remove_var("LLMBOOT_PROJECT_CONFIG_DIR");
            std::env::remove_var("XDG_CONFIG_HOME");
            std::env::remove_var(ENV_MODEL);
            std::env::remove_var(ENV_HOST);
        }

        assert_eq!(config.model.name, "env-model");
        assert_eq!(config.runtime.base_url(), "http://0.0.0.0:11500");
    }

    // ==================== Merge Tests ====================

    #[test]
    fn test_merge_raw_overlay_overrides_base() {
        let base = RawBootstrapConfig {
            model: RawModelConfig {
                name: Some("base-model".to_string()),
                verify: Some(true),
            },
            dependencies: RawDependencyConfig {
                installer: Some("pip".to_string()),
                manifest: Some(PathBuf::from("base.txt")),
            },
            ..Default::default()
        };

        let overlay = RawBootstrapConfig {
            model: RawModelConfig {
                name: Some("overlay-model".to_string()),
                verify: None, // Should preserve base value
            },
            dependencies: RawDependencyConfig {
                installer: Some("uv".to_string()),
                manifest: None,
            },
            ..Default::default()
        };

        let merged = ConfigLoader::merge_raw(base, overlay);

        assert_eq!(merged.model.name, Some("overlay-model".to_string()));
        assert_eq!(merged.model.verify, Some(true));
        assert_eq!(merged.dependencies.installer, Some("uv".to_string()));
        assert_eq!(
            merged.dependencies.manifest,
            Some(PathBuf::from("base.txt"))
        );
    }

    #[test]
    fn test_merge_raw_none_preserves_base() {
        let base = RawBootstrapConfig {
            runtime: RawRuntimeConfig {
                host: Some("http://gpu:11434".to_string()),
                ready_timeout: Some(Duration::from_secs(90)),
                ..Default::default()
            },
            app: RawAppConfig {
                data_dirs: Some(vec![PathBuf::from("state")]),
                run_command: None,
            },
            ..Default::default()
        };

        let merged = ConfigLoader::merge_raw(base, RawBootstrapConfig::default());

        assert_eq!(merged.runtime.host, Some("http://gpu:11434".to_string()));
        assert_eq!(merged.runtime.ready_timeout, Some(Duration::from_secs(90)));
        assert_eq!(merged.app.data_dirs, Some(vec![PathBuf::from("state")]));
    }

    // ==================== Env Tests ====================

    #[test]
    fn test_apply_env_sets_host_and_model() {
        let raw = ConfigLoader::apply_env(
            RawBootstrapConfig::default(),
            env_from(&[(ENV_HOST, "127.0.0.1:9999"), (ENV_MODEL, "mistral:7b")]),
        );

        assert_eq!(raw.runtime.host, Some("127.0.0.1:9999".to_string()));
        assert_eq!(raw.model.name, Some("mistral:7b".to_string()));
    }

    #[test]
    fn test_apply_env_ignores_empty_values() {
        let base = RawBootstrapConfig {
            model: RawModelConfig {
                name: Some("file-model".to_string()),
                verify: None,
            },
            ..Default::default()
        };

        let raw = ConfigLoader::apply_env(base, env_from(&[(ENV_MODEL, "  ")]));

        assert_eq!(raw.model.name, Some("file-model".to_string()));
        assert!(raw.runtime.host.is_none());
    }

    // ==================== Path Tests ====================

    #[test]
    #[serial]
    fn test_user_config_path_is_under_llmboot() {
        let path = ConfigLoader::user_config_path();
        assert!(path.to_string_lossy().contains("llmboot"));
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    #[serial]
    fn test_project_config_path() {
        let path = ConfigLoader::project_config_path();
        assert_eq!(path, PathBuf::from(".llmboot/config.toml"));
    }
}
