use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "NoteTree";
const APP_NAME: &str = "notetree";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_TICK_MS: u64 = 50;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("NOTETREE_CONFIG").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_local_dir().join("state"));
        Ok(Self::from_roots(config_dir, config_file, state_dir))
    }

    /// Lays out every path under explicit roots, used for `--config` and tests.
    pub fn from_roots(config_dir: PathBuf, config_file: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            config_dir,
            config_file,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub fn messages_file(&self) -> PathBuf {
        self.state_dir.join("messages.json")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.log_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ui: UiConfig,
    pub messages: MessagesConfig,
}

impl AppConfig {
    fn post_load(&mut self) {
        let trimmed = self.server.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            tracing::warn!("empty server.base_url in config, falling back to {DEFAULT_BASE_URL}");
            self.server.base_url = DEFAULT_BASE_URL.to_string();
        } else if trimmed != self.server.base_url {
            self.server.base_url = trimmed.to_string();
        }
        if self.ui.tick_ms == 0 {
            tracing::warn!("ui.tick_ms must be positive, falling back to {DEFAULT_TICK_MS}");
            self.ui.tick_ms = DEFAULT_TICK_MS;
        }
        if self.messages.max_entries == 0 {
            tracing::warn!("messages.max_entries must be positive, falling back to 100");
            self.messages.max_entries = MessagesConfig::default().max_entries;
        }
    }

    /// Applies a `--server` override and re-normalises.
    pub fn override_server(&mut self, base_url: &str) {
        self.server.base_url = base_url.to_string();
        self.post_load();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub tick_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl UiConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub max_entries: usize,
    pub persist: bool,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            persist: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        ConfigPaths::from_roots(
            config_dir.clone(),
            config_dir.join("config.toml"),
            base.join("state"),
        )
    }

    #[test]
    fn first_run_writes_default_config() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(temp_paths(&temp));
        let cfg = loader.load_or_init()?;
        assert_eq!(cfg, AppConfig::default());
        assert!(loader.paths().config_file.exists());
        assert!(loader.paths().log_dir.is_dir());

        let reloaded = loader.load()?;
        assert_eq!(reloaded, cfg);
        Ok(())
    }

    #[test]
    fn directories_cover_config_and_state_only() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let mut created: Vec<String> = fs::read_dir(temp.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        created.sort();
        assert_eq!(created, vec!["config", "state"]);
        assert_eq!(paths.log_dir, temp.path().join("state").join("logs"));
        assert_eq!(paths.messages_file(), temp.path().join("state").join("messages.json"));
        Ok(())
    }

    #[test]
    fn invalid_values_are_normalised() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[server]\nbase_url = \"https://notes.example.org/\"\n\n[ui]\ntick_ms = 0\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.server.base_url, "https://notes.example.org");
        assert_eq!(cfg.server.timeout_ms, 10_000);
        assert_eq!(cfg.ui.tick_ms, DEFAULT_TICK_MS);
        assert!(cfg.messages.persist);
        Ok(())
    }

    #[test]
    fn empty_server_override_falls_back_to_default() {
        let mut cfg = AppConfig::default();
        cfg.override_server("  ");
        assert_eq!(cfg.server.base_url, DEFAULT_BASE_URL);
        cfg.override_server("http://10.0.0.2:9000//");
        assert_eq!(cfg.server.base_url, "http://10.0.0.2:9000");
    }
}
