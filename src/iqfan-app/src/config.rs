// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "iqfan.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Default search paths for `iqfan.toml`
/// (current directory → XDG config → /etc).
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("iqfan").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/iqfan").join(CONFIG_FILE_NAME));
    paths
}

/// Deserialize a named section out of TOML text.
///
/// `Ok(None)` when the section is absent.
fn parse_section<T: DeserializeOwned>(
    content: &str,
    key: &str,
    path: &Path,
) -> Result<Option<T>, ConfigError> {
    let table: toml::Table = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

    let Some(section) = table.get(key) else {
        return Ok(None);
    };

    // Round-trip the section so serde defaults apply to missing keys.
    let section_toml = toml::to_string(section)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
    let cfg = toml::from_str::<T>(&section_toml)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
    Ok(Some(cfg))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(&content, key, path)
}

/// Loading of one `iqfan.toml` section into a config type.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key in `iqfan.toml` (e.g. `"iqfan-server"`).
    fn section_key() -> &'static str;

    /// Load the section from a specific file path.
    ///
    /// Errors if the file cannot be read, is not valid TOML, or lacks the
    /// `[<section_key>]` table.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// Parse the section from TOML text; `origin` only labels errors.
    fn load_from_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        parse_section::<Self>(content, Self::section_key(), origin)?.ok_or_else(|| {
            ConfigError::ParseError(
                origin.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// Load the first default-path file that has the section.
    ///
    /// Returns `(Default::default(), None)` when none is found.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in config_search_paths() {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(&path, Self::section_key())? {
                    return Ok((cfg, Some(path)));
                }
            }
        }
        Ok((Self::default(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        name: String,
        depth: u32,
    }

    impl ConfigFile for Sample {
        fn section_key() -> &'static str {
            "sample"
        }
    }

    #[test]
    fn section_is_extracted_with_defaults() {
        let cfg = Sample::load_from_str("[sample]\nname = \"x\"\n", Path::new("inline")).unwrap();
        assert_eq!(
            cfg,
            Sample {
                name: "x".to_string(),
                depth: 0
            }
        );
    }

    #[test]
    fn missing_section_is_an_error() {
        let err = Sample::load_from_str("[other]\nname = \"x\"\n", Path::new("inline")).unwrap_err();
        assert!(err.to_string().contains("missing [sample] section"));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = Sample::load_from_str("[sample\n", Path::new("inline")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_, _)));
    }

    #[test]
    fn unreadable_file_is_a_read_error() {
        let err = Sample::load_from_file(Path::new("/nonexistent/iqfan/iqfan.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_, _)));
    }

    #[test]
    fn search_paths_end_in_etc() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from("iqfan.toml"));
        assert_eq!(
            paths.last().unwrap(),
            &PathBuf::from("/etc/iqfan/iqfan.toml")
        );
    }
}
