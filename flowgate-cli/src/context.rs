//! Shared CLI state: the store-backed engine plus the role directory
//! and delegation ledger persisted alongside it

use anyhow::{Context, Result};
use flowgate::{AuthorityResolver, DelegationLedger, StaticRoleDirectory, WorkflowEngine, WorkflowStore};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a command needs to run
pub struct CliContext {
    pub engine: WorkflowEngine,
    pub directory: StaticRoleDirectory,
    pub ledger: DelegationLedger,
    data_dir: PathBuf,
}

impl CliContext {
    /// Open (or initialize) the data directory and load the role
    /// directory and delegation ledger from it
    pub fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .map(|home| home.join(".flowgate"))
                .unwrap_or_else(|| PathBuf::from(".flowgate")),
        };
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let store = WorkflowStore::file_system(&data_dir)
            .with_context(|| format!("Failed to open store at {}", data_dir.display()))?;
        let directory = load_json_or_default(&data_dir.join("roles.json"))?;
        let ledger = load_json_or_default(&data_dir.join("delegations.json"))?;

        Ok(Self {
            engine: WorkflowEngine::new(store),
            directory,
            ledger,
            data_dir,
        })
    }

    /// An authority resolver over the loaded directory and ledger
    pub fn resolver(&self) -> AuthorityResolver<'_> {
        AuthorityResolver::new(&self.directory, &self.ledger)
    }

    /// Persist the role directory after a mutation
    pub fn save_directory(&self) -> Result<()> {
        save_json(&self.data_dir.join("roles.json"), &self.directory)
    }

    /// Persist the delegation ledger after a mutation
    pub fn save_ledger(&self) -> Result<()> {
        save_json(&self.data_dir.join("delegations.json"), &self.ledger)
    }
}

fn load_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn save_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
