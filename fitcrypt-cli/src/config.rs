// Config file handling

use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Default)]
pub struct Config {
    pub key_dir: Option<String>,
    pub cache_dir: Option<String>,
    pub poly_modulus_degree: Option<usize>,
    pub default_backend: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        // Uses platform-specific config directories:
        //   macOS:   ~/Library/Application Support/run.fitcrypt.fitcrypt/
        //   Linux:   ~/.config/fitcrypt/
        //   Windows: C:\Users\<user>\AppData\Roaming\fitcrypt\fitcrypt\
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Default home of the key bundle and the key cache
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("run", "fitcrypt", "fitcrypt")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let config: Config = toml::from_str("key_dir = \"/tmp/keys\"").unwrap();
        assert_eq!(config.key_dir.as_deref(), Some("/tmp/keys"));
        assert!(config.poly_modulus_degree.is_none());
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = Config {
            key_dir: None,
            cache_dir: Some("/srv/fitcrypt".into()),
            poly_modulus_degree: Some(4096),
            default_backend: Some("mock".into()),
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.cache_dir, config.cache_dir);
        assert_eq!(back.poly_modulus_degree, Some(4096));
    }
}
