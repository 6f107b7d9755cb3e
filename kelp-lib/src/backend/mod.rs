use std::{path::PathBuf, sync::Arc};

use crate::{
    Result,
    config::{Cfg, CoreConfig},
    fs::state_dir,
};

pub mod auth;
pub mod memory;
pub mod records;
pub mod storage;
pub mod supabase;

pub use auth::{AuthChangeEvent, AuthEvent, AuthService, AuthSubscription, Session, User};
pub use memory::MemoryBackend;
pub use records::{ProfileFields, ProfileRecord, RecordStore, StoreError};
pub use storage::ObjectStore;
pub use supabase::SupabaseClient;

const SESSION_FILE: &str = "session.json";

/// Central access point for the hosted backend.
///
/// The [`Backend`] bundles the three services the app talks to (auth, row storage and
/// object storage) together with the configuration they were built from. It is cheap to
/// clone and is handed explicitly to every component that needs it.
#[derive(Clone, Debug)]
pub struct Backend {
    auth: Arc<dyn AuthService>,
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn ObjectStore>,
    cfg: Cfg,
}

impl Backend {
    /// Connect to the hosted backend described by `cfg`, persisting the auth session in
    /// the state directory.
    pub fn supabase(cfg: CoreConfig) -> Result<Self> {
        let session_file = state_dir()?.join(SESSION_FILE);
        Self::supabase_with_session_file(cfg, Some(session_file))
    }

    /// Like [`Backend::supabase`], with explicit control over where (and whether) the
    /// session is persisted.
    pub fn supabase_with_session_file(
        cfg: CoreConfig,
        session_file: Option<PathBuf>,
    ) -> Result<Self> {
        cfg.validate()?;

        let client = SupabaseClient::new(&cfg, session_file)?;

        Ok(Self {
            auth: Arc::new(client.clone()),
            records: Arc::new(client.clone()),
            storage: Arc::new(client),
            cfg: cfg.into_handle(),
        })
    }

    /// Back every service with the given in-memory backend.
    pub fn memory(memory: MemoryBackend) -> Self {
        Self {
            auth: Arc::new(memory.clone()),
            records: Arc::new(memory.clone()),
            storage: Arc::new(memory),
            cfg: CoreConfig::default().into_handle(),
        }
    }

    pub fn auth(&self) -> &dyn AuthService {
        self.auth.as_ref()
    }

    pub fn records(&self) -> &dyn RecordStore {
        self.records.as_ref()
    }

    pub fn storage(&self) -> &dyn ObjectStore {
        self.storage.as_ref()
    }

    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }
}
