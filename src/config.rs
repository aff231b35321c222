use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::environment::TemplateSet;
use crate::gateway::DEFAULT_CALL_TIMEOUT_SECS;
use crate::workflow::WorkflowLinks;
use crate::{elog_debug, Error, Result};

const DEFAULT_NAMESPACE: &str = "argo";
const DEFAULT_ARGO_COMMAND: &str = "argo";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Namespace workflows are submitted into.
    pub namespace: String,
    /// Command line used to invoke the Argo CLI.
    pub argo_command: String,
    pub call_timeout_secs: u64,
    /// Base URL of the Argo UI, used for workflow links.
    pub ui_base_url: Option<String>,
    pub log_level: Option<String>,
    pub templates: TemplateSet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            argo_command: DEFAULT_ARGO_COMMAND.to_string(),
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            ui_base_url: None,
            log_level: None,
            templates: TemplateSet::default(),
        }
    }
}

impl Config {
    pub fn envplane_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".envplane"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::envplane_dir()?.join("envplane.toml"))
    }

    pub fn store_path() -> Result<PathBuf> {
        Ok(Self::envplane_dir()?.join("environments.json"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::envplane_dir()?.join("envplane.log"))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn links(&self) -> Option<WorkflowLinks> {
        self.ui_base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(WorkflowLinks::new)
    }

    /// Load `~/.envplane/envplane.toml`, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        elog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            elog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        elog_debug!(
            "Config loaded: namespace={}, argo_command={}, templates={:?}",
            config.namespace,
            config.argo_command,
            config.templates
        );
        Ok(config)
    }

    /// `ENVPLANE_NAMESPACE` and `ENVPLANE_LOG_LEVEL` win over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(namespace) = lookup("ENVPLANE_NAMESPACE").filter(|v| !v.is_empty()) {
            self.namespace = namespace;
        }
        if let Some(level) = lookup("ENVPLANE_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.log_level = Some(level);
        }
    }
}
