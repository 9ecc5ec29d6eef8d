//! Configuration management for flowgate.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::{default_ignore_dirs, PolicyContext};
use crate::workflow::DEFAULT_WORKFLOW_FILE;

/// Project-local config file name.
pub const LOCAL_CONFIG_FILE: &str = ".flowgate.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Policy context settings
    pub context: ContextConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Workflow document, relative to the project root
    pub workflow: String,

    /// JSON task store, relative to the project root
    pub task_store: String,
}

/// Inputs for rule predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Directories skipped while searching for artifacts
    pub ignore_dirs: Vec<String>,

    /// Maximum directory depth searched for artifacts
    pub max_depth: usize,

    /// Default timeout for command checks
    pub command_timeout_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when neither `RUST_LOG` nor `-v` is given
    pub level: String,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.flowgate.toml` in current directory
    /// 2. `~/.config/flowgate/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        Self::discover(Path::new("."))
    }

    /// Like [`Config::load`], looking for the local file in `dir`.
    pub fn discover(dir: &Path) -> anyhow::Result<Self> {
        let local_config = dir.join(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("flowgate"))
    }

    /// Workflow document path, resolved against `root`.
    pub fn workflow_path(&self, root: &Path) -> PathBuf {
        resolve_path(&self.general.workflow, root)
    }

    /// Task store path, resolved against `root`.
    pub fn task_store_path(&self, root: &Path) -> PathBuf {
        resolve_path(&self.general.task_store, root)
    }

    /// Policy context for a project root.
    pub fn policy_context(&self, root: &Path) -> PolicyContext {
        PolicyContext::new(root)
            .with_ignore_dirs(self.context.ignore_dirs.clone())
            .with_max_depth(self.context.max_depth)
            .with_command_timeout(Duration::from_secs(self.context.command_timeout_secs))
    }
}

/// Expand `~` and resolve relative paths against `root`.
pub fn resolve_path(raw: &str, root: &Path) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).as_ref());
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            workflow: DEFAULT_WORKFLOW_FILE.to_string(),
            task_store: ".flowgate/tasks.json".to_string(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { ignore_dirs: default_ignore_dirs(), max_depth: 8, command_timeout_secs: 30 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.workflow, "flowgate.yml");
        assert_eq!(config.context.max_depth, 8);
        assert_eq!(config.logging.level, "warn");
        assert!(config.context.ignore_dirs.contains(&"node_modules".to_string()));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[context]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            workflow = "ops/workflow.toml"

            [context]
            command_timeout_secs = 5

            [logging]
            level = "info"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.workflow, "ops/workflow.toml");
        assert_eq!(config.general.task_store, ".flowgate/tasks.json");
        assert_eq!(config.context.command_timeout_secs, 5);
        assert_eq!(config.context.max_depth, 8);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_discover_prefers_local_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LOCAL_CONFIG_FILE), "[logging]\nlevel = \"debug\"\n")
            .unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_config_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[context]\nmax_depth = \"deep\"\n").unwrap();
        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_printed_config_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.context.max_depth = 3;
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(Config::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/project");
        assert_eq!(resolve_path("flowgate.yml", root), PathBuf::from("/project/flowgate.yml"));
        assert_eq!(resolve_path("/etc/flow.yml", root), PathBuf::from("/etc/flow.yml"));
        let home = resolve_path("~/flow.yml", root);
        assert!(!home.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_policy_context_from_config() {
        let mut config = Config::default();
        config.context.ignore_dirs = vec!["vendor".to_string()];
        config.context.command_timeout_secs = 7;
        let ctx = config.policy_context(Path::new("/project"));
        assert!(ctx.is_ignored_dir("vendor"));
        assert!(!ctx.is_ignored_dir("target"));
        assert_eq!(ctx.command_timeout(), Duration::from_secs(7));
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial_test::serial(config_env)]
    fn test_discover_falls_back_to_global_config() {
        let xdg = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let global = xdg.path().join("flowgate");
        std::fs::create_dir_all(&global).unwrap();
        std::fs::write(global.join("config.toml"), "[logging]\nlevel = \"debug\"\n").unwrap();

        let previous = std::env::var_os("XDG_CONFIG_HOME");
        std::env::set_var("XDG_CONFIG_HOME", xdg.path());
        let config = Config::discover(project.path());
        match previous {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }

        assert_eq!(config.unwrap().logging.level, "debug");
    }
}
