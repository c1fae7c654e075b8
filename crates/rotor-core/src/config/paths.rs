//! Standard locations for rotor configuration files

use std::path::PathBuf;

/// File name of the default configuration
pub const CONFIG_FILENAME: &str = "rotor.yaml";

/// Directory holding rotor configuration
///
/// Returns: `{platform config dir}/rotor`, or `./rotor` if the platform has
/// no config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rotor")
}

/// Path of a configuration file inside [`config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_rotor() {
        assert!(config_dir().ends_with("rotor"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path(CONFIG_FILENAME);
        assert!(path.ends_with("rotor/rotor.yaml"));
    }
}
