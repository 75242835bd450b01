use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use renderer::ExportSettings;
use serde::{Deserialize, Serialize};

/// Contents of `scatterlight.toml`; every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub export: ExportSettings,
}

impl AppConfig {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file at {}", path.display()))?;
            let config: Self = toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file at {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let root = TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&root.path().join("scatterlight.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.export.screenshot.height, 2048);
    }

    #[test]
    fn export_sections_override_field_by_field() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("scatterlight.toml");
        fs::write(
            &path,
            "[export.gif]\nframes = 24\n\n[export.video]\nsteps_per_point = 30\n",
        )
        .unwrap();

        let config = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(config.export.gif.frames, 24);
        assert_eq!(config.export.gif.height, 480);
        assert_eq!(config.export.video.steps_per_point, 30);
        assert_eq!(config.export.video.fps, 25);
    }

    #[test]
    fn malformed_config_is_reported() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("scatterlight.toml");
        fs::write(&path, "[export.gif]\nframes = \"many\"\n").unwrap();
        let err = AppConfig::load_or_default(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }
}
