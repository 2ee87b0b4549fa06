use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::config::DaemonConfig;
use crate::ledger::Ledger;
use crate::seed::SeedData;
use crate::session::Session;
use crate::store::{KeyValueStore, MemoryStore, SqliteStore};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Box<dyn KeyValueStore>,
    pub config: DaemonConfig,
    pub seed: SeedData,
    pub session: Session,
    pub ledger: Ledger,
}

impl AppState {
    /// Fresh daemon state on an in-memory store; nothing survives the process
    /// until a workspace is selected.
    pub fn new(config: DaemonConfig) -> Self {
        let seed = SeedData::generate(config.seed, &chrono::Utc::now().to_rfc3339());
        let mut store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        let mut session = Session::new();
        session.restore(store.as_mut());
        let ledger = Ledger::load(store.as_mut(), &seed.records);
        Self {
            workspace: None,
            store,
            config,
            seed,
            session,
            ledger,
        }
    }

    /// Switch persistence to `<path>/attendance.sqlite3` and reload the saved
    /// session and records from it.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let store = SqliteStore::open(path)
            .with_context(|| format!("opening workspace {}", path.display()))?;
        self.store = Box::new(store);
        self.workspace = Some(path.to_path_buf());

        let mut session = Session::new();
        session.restore(self.store.as_mut());
        self.session = session;
        self.ledger = Ledger::load(self.store.as_mut(), &self.seed.records);
        tracing::info!(
            workspace = %path.display(),
            records = self.ledger.len(),
            "workspace opened"
        );
        Ok(())
    }
}
