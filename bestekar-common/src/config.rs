//! Configuration loading and folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Resolve a data folder following the priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file key
/// 4. Compiled default (fallback)
pub fn resolve_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_file_key: &str,
    default: impl FnOnce() -> PathBuf,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(value) = config.get(config_file_key).and_then(|v| v.as_str()) {
                    return PathBuf::from(value);
                }
            }
        }
    }

    // Priority 4: Compiled default
    default()
}

/// Locate the Bestekar config file for the platform.
///
/// Linux checks the user config directory first, then the system-wide
/// location; macOS and Windows use the platform config directory.
pub fn find_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        if let Some(path) = dirs::config_dir().map(|d| d.join("bestekar").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/bestekar/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("bestekar").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config("No config file found".to_string()))
        }
    }
}

/// Default music output folder: `music/` under the current directory.
pub fn default_music_folder() -> PathBuf {
    PathBuf::from("music")
}

/// Default voice profile folder: `rvc/` under the current directory.
pub fn default_profiles_folder() -> PathBuf {
    PathBuf::from("rvc")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_wins() {
        let folder = resolve_folder(
            Some("/tmp/cli-music"),
            "BESTEKAR_TEST_UNSET_VAR",
            "music_folder",
            default_music_folder,
        );
        assert_eq!(folder, PathBuf::from("/tmp/cli-music"));
    }

    #[test]
    fn test_env_var_beats_default() {
        std::env::set_var("BESTEKAR_TEST_MUSIC_VAR", "/tmp/env-music");
        let folder = resolve_folder(
            None,
            "BESTEKAR_TEST_MUSIC_VAR",
            "music_folder",
            default_music_folder,
        );
        std::env::remove_var("BESTEKAR_TEST_MUSIC_VAR");
        assert_eq!(folder, PathBuf::from("/tmp/env-music"));
    }

    #[test]
    fn test_falls_back_to_default() {
        let folder = resolve_folder(
            None,
            "BESTEKAR_TEST_UNSET_VAR",
            "no_such_key_in_any_config",
            || PathBuf::from("fallback"),
        );
        assert_eq!(folder, PathBuf::from("fallback"));
    }
}
