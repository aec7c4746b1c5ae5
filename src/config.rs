//! Layered settings for the downloader.
//!
//! Sources are merged in order, later ones winning: built-in defaults,
//! `segfetch.toml` in the working directory, an explicit file passed on the
//! command line, then `SEGFETCH_*` environment variables.
use config::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const LOCAL_CONFIG: &str = "segfetch";
const ENV_PREFIX: &str = "SEGFETCH";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Connection ceiling used when `--threads` is not given.
    pub threads: u8,
    /// How long one capability probe may hold its connection.
    pub probe_timeout_ms: u64,
    /// Pause between successful probe waves.
    pub probe_cooldown_ms: u64,
    /// Receive cap for capability probes, in bytes per second.
    pub probe_rate_limit: u32,
    pub user_agent: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threads: 4,
            probe_timeout_ms: 1000,
            probe_cooldown_ms: 1000,
            probe_rate_limit: 1,
            user_agent: format!("segfetch/{}", env!("CARGO_PKG_VERSION")),
            log_level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from every configured source.
    ///
    /// # Errors
    ///
    /// Fails if `path` is given but does not exist, or if any source holds a
    /// value of the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::layered(LOCAL_CONFIG, path, None)
    }

    /// `env` replaces the process environment when given.
    fn layered(
        local: &str,
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::File::with_name(local).required(false));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::Message(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).source(env))
            .build()?
            .try_deserialize()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn probe_cooldown(&self) -> Duration {
        Duration::from_millis(self.probe_cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_probe_contract() {
        let settings = Settings::default();
        assert_eq!(settings.threads, 4);
        assert_eq!(settings.probe_timeout(), Duration::from_secs(1));
        assert_eq!(settings.probe_cooldown(), Duration::from_secs(1));
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "threads = 8\nprobe_cooldown_ms = 0").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.threads, 8);
        assert_eq!(settings.probe_cooldown_ms, 0);
        // Untouched keys keep their defaults
        assert_eq!(settings.probe_timeout_ms, 1000);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Settings::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn environment_beats_explicit_file_beats_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("segfetch.toml"),
            "threads = 5\nprobe_timeout_ms = 10\nprobe_cooldown_ms = 10\n",
        )
        .unwrap();
        let explicit = dir.path().join("explicit.toml");
        std::fs::write(&explicit, "threads = 6\nprobe_timeout_ms = 20\n").unwrap();

        let local = dir.path().join("segfetch");
        let env = config::Map::from([
            ("SEGFETCH_THREADS".to_string(), "9".to_string()),
            ("SEGFETCH_PROBE_RATE_LIMIT".to_string(), "64".to_string()),
        ]);

        let settings =
            Settings::layered(local.to_str().unwrap(), Some(&explicit), Some(env)).unwrap();
        assert_eq!(settings.threads, 9);
        assert_eq!(settings.probe_rate_limit, 64);
        assert_eq!(settings.probe_timeout_ms, 20);
        assert_eq!(settings.probe_cooldown_ms, 10);
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn wrong_type_is_an_error() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "threads = \"many\"").unwrap();

        assert!(Settings::load(Some(file.path())).is_err());
    }
}
