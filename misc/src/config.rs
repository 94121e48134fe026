use std::path::PathBuf;
use std::{env, fs, io};

use anyhow::{Context, Result};
use clap::Args;
use log::warn;
use serde::de::DeserializeOwned;

use crate::dirs::{ensure_dir_exists, home_dir};

/// Resolved filesystem locations for configuration and data.
pub struct PathSet {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub pki_dir: PathBuf,
}

impl PathSet {
    pub fn new(config_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        // Check if running as root (UID == 0)
        let is_root = unsafe { libc::geteuid() == 0 };

        let config_dir = if let Some(path) = config_dir {
            path
        } else if let Ok(path) = env::var("PORTAL_CONFIG") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/etc/portal")
        } else {
            home_dir()?.join(".config").join("portal")
        };

        let data_dir = if let Some(path) = data_dir {
            path
        } else if let Ok(path) = env::var("PORTAL_DATA") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/var/lib/portal")
        } else {
            home_dir()?.join(".local").join("share").join("portal")
        };

        // PKI path is always under config path
        let pki_dir = config_dir.join("pki");

        ensure_dir_exists(&config_dir)
            .with_context(|| format!("ensure config directory: {}", config_dir.display()))?;
        ensure_dir_exists(&data_dir)
            .with_context(|| format!("ensure data directory: {}", data_dir.display()))?;
        ensure_dir_exists(&pki_dir)
            .with_context(|| format!("ensure pki directory: {}", pki_dir.display()))?;

        Ok(Self {
            config_dir,
            data_dir,
            pki_dir,
        })
    }

    pub fn load_config<T>(&self, name: &str) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
    {
        let path = self.config_dir.join(format!("{name}.toml"));
        let mut cfg: T = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s).context("parse config toml")?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config file for {name} not found, using defaults");
                T::default()
            }
            Err(err) => {
                return Err(err).context(format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }
}

/// Common behavior for toml-backed configuration structs: a default value and
/// a completion pass that validates fields and resolves paths.
pub trait CommonConfig: Default {
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

/// Command line flags shared by all binaries that load configuration.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Override the config directory path.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Override the data directory path.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn build_path_set(&self) -> Result<PathSet> {
        PathSet::new(self.config_dir.clone(), self.data_dir.clone())
    }

    pub fn load<T>(&self, name: &str) -> Result<(T, PathSet)>
    where
        T: CommonConfig + DeserializeOwned,
    {
        let ps = self.build_path_set()?;
        let cfg = ps.load_config(name)?;
        Ok((cfg, ps))
    }
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use anyhow::bail;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(default = "TestConfig::default_value")]
        value: u64,
    }

    impl Default for TestConfig {
        fn default() -> Self {
            Self {
                value: Self::default_value(),
            }
        }
    }

    impl CommonConfig for TestConfig {
        fn complete(&mut self, _ps: &PathSet) -> Result<()> {
            if self.value == 0 {
                bail!("value must be greater than 0");
            }
            Ok(())
        }
    }

    impl TestConfig {
        fn default_value() -> u64 {
            30
        }
    }

    #[test]
    fn test_load_default() {
        let dir = std::env::temp_dir().join("portal-config-test");
        let ps = PathSet::new(Some(dir.clone()), Some(dir.join("data"))).unwrap();

        let cfg: TestConfig = ps.load_config("no_such_config").unwrap();
        assert_eq!(cfg.value, 30);
    }

    #[test]
    fn test_load_file() {
        let dir = std::env::temp_dir().join("portal-config-test-file");
        let ps = PathSet::new(Some(dir.clone()), Some(dir.join("data"))).unwrap();

        fs::write(dir.join("portal_test.toml"), "value = 55\n").unwrap();
        let cfg: TestConfig = ps.load_config("portal_test").unwrap();
        assert_eq!(cfg.value, 55);

        fs::write(dir.join("portal_bad.toml"), "value = 0\n").unwrap();
        let result: Result<TestConfig> = ps.load_config("portal_bad");
        assert!(result.is_err());
    }
}
