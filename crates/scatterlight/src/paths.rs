use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories_next::{ProjectDirs, UserDirs};

pub const ENV_CONFIG_DIR: &str = "SCATTERLIGHT_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "SCATTERLIGHT_DATA_DIR";
pub const ENV_OUTPUT_DIR: &str = "SCATTERLIGHT_OUTPUT_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Scatterlight";
const APPLICATION: &str = "Scatterlight";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
    output_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;

        let config_dir = resolve_dir(ENV_CONFIG_DIR, project_dirs.config_dir())
            .context("failed to resolve scatterlight config directory")?;
        let data_dir = resolve_dir(ENV_DATA_DIR, project_dirs.data_dir())
            .context("failed to resolve scatterlight data directory")?;
        let output_dir = env_override(ENV_OUTPUT_DIR).unwrap_or_else(|| default_output_dir(&data_dir));

        Ok(Self {
            config_dir,
            data_dir,
            output_dir,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("scatterlight.toml")
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("camera.toml")
    }

    pub fn keyframe_file(&self) -> PathBuf {
        self.data_dir.join("keyframes.toml")
    }
}

fn resolve_dir(env_var: &str, default: &Path) -> Result<PathBuf> {
    if let Some(value) = env_override(env_var) {
        return Ok(value);
    }
    Ok(default.to_path_buf())
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

/// Desktop when the platform reports one, else `<data>/captures`.
fn default_output_dir(data_dir: &Path) -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.desktop_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| data_dir.join("captures"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_overrides_take_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let data_dir = root.path().join("data");
        let output_dir = root.path().join("renders");

        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);
        let _data_guard = EnvGuard::set(ENV_DATA_DIR, &data_dir);
        let _output_guard = EnvGuard::set(ENV_OUTPUT_DIR, &output_dir);

        let paths = AppPaths::discover().unwrap();

        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.data_dir(), data_dir.as_path());
        assert_eq!(paths.output_dir(), output_dir.as_path());
        assert_eq!(paths.config_file(), config_dir.join("scatterlight.toml"));
        assert_eq!(paths.state_file(), data_dir.join("camera.toml"));
        assert_eq!(paths.keyframe_file(), data_dir.join("keyframes.toml"));
    }
}
