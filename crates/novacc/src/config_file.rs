//! Optional persistent `novacc.toml` configuration (`SPEC_FULL.md` §B):
//! include paths, mangling style, and compiler-identity selection that
//! would otherwise have to be repeated as CLI flags on every invocation.
//! Read with `toml` + `serde`, matching the teacher workspace's existing
//! config-file pattern (`moss-cli::config`).

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub mangling: Option<String>,
    #[serde(default)]
    pub gcc_compat: bool,
    #[serde(default)]
    pub eager_template_instantiation: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Looks for `novacc.toml` next to the translation unit, falling back to
/// the current working directory. Returns `Ok(None)` (not an error) when
/// no config file exists anywhere in that search — persistent config is
/// opt-in.
pub fn load_near(input: &Path) -> Result<Option<FileConfig>, ConfigFileError> {
    let candidates = [
        input.parent().map(|d| d.join("novacc.toml")),
        Some(PathBuf::from("novacc.toml")),
    ];
    for candidate in candidates.into_iter().flatten() {
        if candidate.is_file() {
            let text = std::fs::read_to_string(&candidate).map_err(|source| ConfigFileError::Io {
                path: candidate.display().to_string(),
                source,
            })?;
            let config = toml::from_str(&text).map_err(|source| ConfigFileError::Parse {
                path: candidate.display().to_string(),
                source,
            })?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_near(&dir.path().join("main.cpp")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn loads_include_dirs_and_mangling_next_to_the_input() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("novacc.toml"),
            "include-dirs = [\"vendor/include\"]\nmangling = \"itanium\"\n",
        )
        .unwrap();
        let config = load_near(&dir.path().join("main.cpp")).unwrap().unwrap();
        assert_eq!(config.include_dirs, vec![PathBuf::from("vendor/include")]);
        assert_eq!(config.mangling.as_deref(), Some("itanium"));
    }
}
