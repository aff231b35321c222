//! File-backed keyed store for environment aggregates.
//!
//! The orchestrator returns environments by value and forgets them; this
//! is where the CLI keeps them between a create and later reads. Keyed by
//! environment name. One writer at a time is assumed (single CLI process).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::environment::Environment;
use crate::util::{blocking, blocking_with_timeout};
use crate::workflow::WorkflowReference;
use crate::{elog_debug, Error, Result};

const STORE_VERSION: u32 = 1;
const SAVE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    environments: BTreeMap<String, Environment>,
}

#[derive(Debug, Clone)]
pub struct EnvironmentStore {
    path: PathBuf,
    environments: BTreeMap<String, Environment>,
}

impl EnvironmentStore {
    /// Empty store that will save to `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            environments: BTreeMap::new(),
        }
    }

    /// Load the default store at `~/.envplane/environments.json`.
    pub async fn load() -> Result<Self> {
        Self::load_from(Config::store_path()?).await
    }

    pub async fn load_from(path: PathBuf) -> Result<Self> {
        blocking(move || Self::load_sync(path)).await
    }

    fn load_sync(path: PathBuf) -> Result<Self> {
        elog_debug!("EnvironmentStore::load path={}", path.display());
        if !path.exists() {
            elog_debug!("Store file not found, starting empty");
            return Ok(Self::new(path));
        }

        let contents = fs::read_to_string(&path)?;
        let file: StoreFile = serde_json::from_str(&contents)?;
        if file.version != STORE_VERSION {
            return Err(Error::UnsupportedStoreVersion {
                path: path.display().to_string(),
                found: file.version,
                supported: STORE_VERSION,
            });
        }
        elog_debug!(
            "Store loaded: version={} environments={}",
            file.version,
            file.environments.len()
        );
        Ok(Self {
            path,
            environments: file.environments,
        })
    }

    /// Write the store, keeping the previous file as `.bak`.
    pub async fn save(&self) -> Result<()> {
        let file = StoreFile {
            version: STORE_VERSION,
            environments: self.environments.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        let path = self.path.clone();

        blocking_with_timeout(SAVE_TIMEOUT, move || {
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() && !dir.exists() {
                    fs::create_dir_all(dir)?;
                }
            }

            if path.exists() {
                fs::copy(&path, path.with_extension("json.bak"))?;
            }

            let temp_path = path.with_extension("json.tmp");
            fs::write(&temp_path, &contents)?;
            fs::rename(&temp_path, &path)?;
            elog_debug!("Store saved: {}", path.display());
            Ok(())
        })
        .await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a newly created environment. Names are unique.
    pub fn insert(&mut self, env: Environment) -> Result<()> {
        let name = env.name().to_string();
        if self.environments.contains_key(&name) {
            return Err(Error::EnvironmentExists(name));
        }
        self.environments.insert(name, env);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Environment> {
        self.environments
            .get(name)
            .ok_or_else(|| Error::EnvironmentNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }

    /// Attach a destroy reference to a stored environment.
    pub fn record_destroy(&mut self, name: &str, reference: WorkflowReference) -> Result<&Environment> {
        let env = self
            .environments
            .remove(name)
            .ok_or_else(|| Error::EnvironmentNotFound(name.to_string()))?;
        let updated = env.with_destroy(reference);
        Ok(self.environments.entry(name.to_string()).or_insert(updated))
    }

    pub fn remove(&mut self, name: &str) -> Result<Environment> {
        self.environments
            .remove(name)
            .ok_or_else(|| Error::EnvironmentNotFound(name.to_string()))
    }

    pub fn list(&self) -> impl Iterator<Item = &Environment> {
        self.environments.values()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}
