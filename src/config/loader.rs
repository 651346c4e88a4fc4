//! Configuration loader with tier-based merging.

use super::merge::merge_tiers;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the config file looked up in each tier directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// File-backed configuration tiers, lowest priority first.
///
/// Built-in defaults sit below these and environment variables above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Project-level config ($CWD/task-tree/)
    Project,
    /// User-level config (~/.task-tree/)
    User,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
        }
    }
}

/// Directories searched for each tier.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: TASK_TREE_USER_DIR or ~/.task-tree
        let user_dir = std::env::var("TASK_TREE_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".task-tree")));

        // Project dir: TASK_TREE_PROJECT_DIR or $CWD/task-tree
        let project_dir = std::env::var("TASK_TREE_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("task-tree")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Read a YAML file as a JSON value for merging.
///
/// Missing files yield `None`; unreadable or malformed files are logged and skipped.
fn read_tier(path: &Path, tier: ConfigTier) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), %tier, error = %e, "Failed to read config file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            debug!(path = %path.display(), %tier, "Loaded config tier");
            Some(value)
        }
        Err(e) => {
            warn!(path = %path.display(), %tier, error = %e, "Ignoring malformed config file");
            None
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Highest-priority config file that contributed, if any.
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers, honouring `TASK_TREE_CONFIG_PATH`.
    pub fn load(explicit_path: Option<PathBuf>) -> Result<Self> {
        let explicit_path =
            explicit_path.or_else(|| std::env::var("TASK_TREE_CONFIG_PATH").ok().map(PathBuf::from));
        Self::load_with(ConfigPaths::discover(), explicit_path, |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit paths and environment lookup.
    ///
    /// An explicit config file replaces the project and user tiers and must
    /// parse; tier files are optional and skipped when broken.
    pub fn load_with(
        paths: ConfigPaths,
        explicit_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut configs: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut config_path = None;

        if let Some(path) = explicit_path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let value: Value = serde_yaml::from_str(&content)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            configs.push(value);
            config_path = Some(path);
        } else {
            for (dir, tier) in [
                (&paths.project_dir, ConfigTier::Project),
                (&paths.user_dir, ConfigTier::User),
            ] {
                let Some(dir) = dir else { continue };
                let file = dir.join(CONFIG_FILE_NAME);
                if let Some(value) = read_tier(&file, tier) {
                    configs.push(value);
                    config_path = Some(file);
                }
            }
        }

        let merged = merge_tiers(configs);
        let mut config: Config = serde_json::from_value(merged)?;

        Self::apply_env_overrides(&mut config, env);

        Ok(Self {
            paths,
            config,
            config_path,
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
        if let Some(db_path) = env("TASK_TREE_DB_PATH") {
            config.server.db_path = PathBuf::from(db_path);
        }

        if let Some(host) = env("TASK_TREE_HOST") {
            config.server.host = host;
        }

        if let Some(port) = env("TASK_TREE_PORT") {
            match port.parse() {
                Ok(port) => config.server.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid TASK_TREE_PORT"),
            }
        }

        if let Some(interval) = env("TASK_TREE_ARCHIVE_INTERVAL") {
            match interval.parse() {
                Ok(secs) => config.archive.interval_seconds = secs,
                Err(_) => warn!(value = %interval, "Ignoring invalid TASK_TREE_ARCHIVE_INTERVAL"),
            }
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Path of the config file that was applied last, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn temp_paths(temp: &TempDir) -> ConfigPaths {
        ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        )
    }

    #[test]
    fn test_load_defaults_only() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::load_with(temp_paths(&temp), None, no_env).unwrap();

        assert_eq!(loader.config(), &Config::default());
        assert!(loader.config_path().is_none());
    }

    #[test]
    fn test_project_config_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("project");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(
            project_dir.join("config.yaml"),
            "server:\n  port: 8080\npagination:\n  default_limit: 25\n",
        )
        .unwrap();

        let loader = ConfigLoader::load_with(temp_paths(&temp), None, no_env).unwrap();
        let config = loader.config();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.pagination.default_limit, 25);
        assert_eq!(config.pagination.max_limit, 100);
    }

    #[test]
    fn test_user_config_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("project");
        let user_dir = temp.path().join("user");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(
            project_dir.join("config.yaml"),
            "archive:\n  interval_seconds: 60\n  enabled: false\n",
        )
        .unwrap();
        std::fs::write(user_dir.join("config.yaml"), "archive:\n  interval_seconds: 30\n").unwrap();

        let loader = ConfigLoader::load_with(temp_paths(&temp), None, no_env).unwrap();
        let config = loader.config();

        assert_eq!(config.archive.interval_seconds, 30);
        assert!(!config.archive.enabled);
        assert_eq!(loader.config_path(), Some(user_dir.join("config.yaml").as_path()));
    }

    #[test]
    fn test_env_overrides_files() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("project");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "server:\n  port: 8080\n").unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("TASK_TREE_PORT", "9090"),
            ("TASK_TREE_DB_PATH", "/tmp/tasks.db"),
            ("TASK_TREE_ARCHIVE_INTERVAL", "not-a-number"),
        ]);
        let loader = ConfigLoader::load_with(temp_paths(&temp), None, |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();
        let config = loader.config();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.db_path, PathBuf::from("/tmp/tasks.db"));
        assert_eq!(config.archive.interval_seconds, 300);
    }

    #[test]
    fn test_malformed_tier_is_skipped() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("project");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "server: [unclosed").unwrap();

        let loader = ConfigLoader::load_with(temp_paths(&temp), None, no_env).unwrap();
        assert_eq!(loader.config(), &Config::default());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yaml");
        let result = ConfigLoader::load_with(temp_paths(&temp), Some(missing), no_env);
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_path_skips_tiers() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("project");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "server:\n  port: 8080\n").unwrap();
        let explicit = temp.path().join("custom.yaml");
        std::fs::write(&explicit, "server:\n  host: 0.0.0.0\n").unwrap();

        let loader =
            ConfigLoader::load_with(temp_paths(&temp), Some(explicit.clone()), no_env).unwrap();

        assert_eq!(loader.config().server.host, "0.0.0.0");
        assert_eq!(loader.config().server.port, 5000);
        assert_eq!(loader.config_path(), Some(explicit.as_path()));
    }
}
