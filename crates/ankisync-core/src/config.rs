//! Configuration
//!
//! Values are layered: built-in defaults, then `config.toml` (under the
//! platform config dir, or `ANKISYNC_CONFIG`), then `ANKISYNC_*` variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "ANKISYNC";

/// Where AnkiConnect listens by default
pub const DEFAULT_ANKI_URL: &str = "http://127.0.0.1:8765";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Vault root; every `.md` below it is a sync candidate
    #[serde(default = "default_vault_dir")]
    pub vault_dir: PathBuf,

    /// Name used in `obsidian://` links, if not the vault folder's
    #[serde(default)]
    pub vault_name: Option<String>,

    /// Holds `state.json` and `sync.lock`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_anki_url")]
    pub anki_url: String,

    /// Vault-relative folder of note-type templates; `import` requires it
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
            vault_name: None,
            data_dir: default_data_dir(),
            anki_url: DEFAULT_ANKI_URL.to_string(),
            templates_dir: None,
            log_file: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// `--config` wins over the default location
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        Self::load_from_path(&path.cloned().unwrap_or_else(Self::config_file_path))
    }

    /// Read `path` (defaults when absent), apply the environment and create
    /// the data directory
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read config file {}", path.display()))
            }
        };

        config.apply_env_overrides();
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Cannot create data directory {}", config.data_dir.display())
        })?;
        Ok(config)
    }

    fn parse(toml_content: &str) -> Result<Self> {
        toml::from_str(toml_content).context("Config is not valid TOML")
    }

    fn apply_env_overrides(&mut self) {
        if let Some(dir) = env_value("VAULT_DIR") {
            self.vault_dir = dir.into();
        }
        if let Some(dir) = env_value("DATA_DIR") {
            self.data_dir = dir.into();
        }
        if let Some(url) = env_value("ANKI_URL").filter(|url| !url.is_empty()) {
            self.anki_url = url;
        }
        // Empty clears these
        if let Some(dir) = env_value("TEMPLATES_DIR") {
            self.templates_dir = (!dir.is_empty()).then(|| dir.into());
        }
        if let Some(file) = env_value("LOG_FILE") {
            self.log_file = (!file.is_empty()).then(|| file.into());
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Cannot serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Cannot write config file {}", config_path.display()))
    }

    /// `ANKISYNC_CONFIG`, or `<config dir>/ankisync/config.toml`
    pub fn config_file_path() -> PathBuf {
        env_value("CONFIG").map(PathBuf::from).unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ankisync")
                .join("config.toml")
        })
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("sync.lock")
    }

    /// `vault_name`, or the vault folder's own name
    pub fn effective_vault_name(&self) -> String {
        if let Some(ref name) = self.vault_name {
            return name.clone();
        }
        self.vault_dir
            .canonicalize()
            .unwrap_or_else(|_| self.vault_dir.clone())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vault".to_string())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, key)).ok()
}

fn default_vault_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ankisync")
}

fn default_anki_url() -> String {
    DEFAULT_ANKI_URL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 5] = [
        "ANKISYNC_VAULT_DIR",
        "ANKISYNC_DATA_DIR",
        "ANKISYNC_ANKI_URL",
        "ANKISYNC_TEMPLATES_DIR",
        "ANKISYNC_LOG_FILE",
    ];

    /// Holds the env lock with every ANKISYNC_* override cleared, restoring
    /// the previous values on drop
    struct CleanEnv {
        _lock: MutexGuard<'static, ()>,
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl CleanEnv {
        fn new() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let saved = ENV_VARS.iter().map(|&name| (name, env::var(name).ok())).collect();
            ENV_VARS.iter().for_each(|name| env::remove_var(name));
            Self { _lock: lock, saved }
        }
    }

    impl Drop for CleanEnv {
        fn drop(&mut self) {
            for (name, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.anki_url, DEFAULT_ANKI_URL);
        assert!(config.templates_dir.is_none());
        assert!(config.data_dir.ends_with("ankisync"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.state_path().ends_with("state.json"));
        assert!(config.lock_path().ends_with("sync.lock"));
    }

    #[test]
    fn test_env_override_dirs() {
        let _env = CleanEnv::new();

        let mut config = Config::default();

        env::set_var("ANKISYNC_DATA_DIR", "/tmp/ankisync-test");
        env::set_var("ANKISYNC_VAULT_DIR", "/tmp/vault");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/ankisync-test"));
        assert_eq!(config.vault_dir, PathBuf::from("/tmp/vault"));
    }

    #[test]
    fn test_env_override_templates_dir() {
        let _env = CleanEnv::new();

        let mut config = Config::default();

        env::set_var("ANKISYNC_TEMPLATES_DIR", "Templates");
        config.apply_env_overrides();
        assert_eq!(config.templates_dir, Some(PathBuf::from("Templates")));

        // Empty string clears it
        env::set_var("ANKISYNC_TEMPLATES_DIR", "");
        config.apply_env_overrides();
        assert!(config.templates_dir.is_none());
    }

    #[test]
    fn test_env_override_empty_anki_url_keeps_default() {
        let _env = CleanEnv::new();

        let mut config = Config::default();
        env::set_var("ANKISYNC_ANKI_URL", "");
        config.apply_env_overrides();
        assert_eq!(config.anki_url, DEFAULT_ANKI_URL);

        env::set_var("ANKISYNC_ANKI_URL", "http://10.0.0.2:8765");
        config.apply_env_overrides();
        assert_eq!(config.anki_url, "http://10.0.0.2:8765");
    }

    #[test]
    fn test_parse_partial_file() {
        let toml = r#"
            vault_dir = "/notes"
            vault_name = "Brain"
            templates_dir = "Templates"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.vault_dir, PathBuf::from("/notes"));
        assert_eq!(config.effective_vault_name(), "Brain");
        assert_eq!(config.templates_dir, Some(PathBuf::from("Templates")));
        assert_eq!(config.anki_url, DEFAULT_ANKI_URL);
    }

    #[test]
    fn test_vault_name_from_dir() {
        let config = Config {
            vault_dir: PathBuf::from("/does/not/exist/MyVault"),
            ..Config::default()
        };
        assert_eq!(config.effective_vault_name(), "MyVault");
    }

    #[test]
    fn test_save_and_reload() {
        let _env = CleanEnv::new();
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            vault_dir: PathBuf::from("/notes"),
            data_dir: temp_dir.path().join("data"),
            templates_dir: Some(PathBuf::from("Templates")),
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.vault_dir, config.vault_dir);
        assert_eq!(loaded.templates_dir, config.templates_dir);
        assert!(loaded.data_dir.exists());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _env = CleanEnv::new();
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("ANKISYNC_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.anki_url, DEFAULT_ANKI_URL);
    }

    #[test]
    fn test_env_override_log_file() {
        let _env = CleanEnv::new();

        let mut config = Config::default();
        env::set_var("ANKISYNC_LOG_FILE", "/tmp/ankisync.log");
        config.apply_env_overrides();
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/ankisync.log")));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let _env = CleanEnv::new();
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "vault_dir = [").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }
}
