//! XDG Base Directory paths for llmboot.
//!
//! The bootstrapper keeps its user config under the XDG config home on every
//! platform, the same way `gh` or `kubectl` do.

use std::path::PathBuf;

/// Application directory name used under the XDG roots.
pub const APP_DIR: &str = "llmboot";

/// Get the llmboot config directory.
///
/// Returns `$XDG_CONFIG_HOME/llmboot` if set, otherwise `~/.config/llmboot`.
///
/// # Examples
///
/// ```
/// use llmboot_paths::config_dir;
///
/// let config = config_dir();
/// let file = config.join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config").join(APP_DIR)
    } else {
        PathBuf::from(".config").join(APP_DIR)
    }
}

/// Path of the user-level config file.
pub fn user_config_file() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_dir_ends_with_app_dir() {
        let path = config_dir();
        assert!(path.ends_with(APP_DIR), "config_dir should end with 'llmboot'");
    }

    #[test]
    #[serial]
    fn test_config_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
        }
        let path = config_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-config/llmboot"));
        assert_eq!(
            user_config_file(),
            PathBuf::from("/tmp/test-config/llmboot/config.toml")
        );
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }
}
