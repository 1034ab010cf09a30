//! Persistence collaborators: accounts, characters and the world document

pub mod file;
pub mod memory;
pub mod records;
pub mod rest;
pub mod worker;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use records::{AccountRecord, CharacterRecord, WorldFile};
pub use rest::RestStore;
pub use worker::{PersistNotice, PersistRequest, PersistenceWorker};

use crate::config::Config;
use crate::game::CharacterId;

/// Errors from any storage backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[source] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("World document not found")]
    WorldMissing,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Backend selected at startup
#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    File(FileStore),
    Rest(RestStore),
}

impl Store {
    /// REST when `STORE_URL` is set, otherwise JSON files under `DATA_DIR`
    pub fn from_config(config: &Config) -> Self {
        match (&config.store_url, &config.store_key) {
            (Some(url), Some(key)) => Store::Rest(RestStore::new(url, key)),
            _ => Store::File(FileStore::new(&config.data_dir, &config.world_file)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::File(_) => "file",
            Store::Rest(_) => "rest",
        }
    }

    pub async fn load_world(&self) -> Result<WorldFile, StoreError> {
        match self {
            Store::Memory(store) => store.load_world(),
            Store::File(store) => store.load_world().await,
            Store::Rest(store) => store.load_world().await,
        }
    }

    pub async fn save_world(&self, world: &WorldFile) -> Result<(), StoreError> {
        match self {
            Store::Memory(store) => store.save_world(world),
            Store::File(store) => store.save_world(world).await,
            Store::Rest(store) => store.save_world(world).await,
        }
    }

    pub async fn load_account(&self, username: &str) -> Result<Option<AccountRecord>, StoreError> {
        match self {
            Store::Memory(store) => store.load_account(username),
            Store::File(store) => store.load_account(username).await,
            Store::Rest(store) => store.load_account(username).await,
        }
    }

    /// `Ok(false)` when the username is already taken
    pub async fn create_account(&self, account: &AccountRecord) -> Result<bool, StoreError> {
        match self {
            Store::Memory(store) => store.create_account(account),
            Store::File(store) => store.create_account(account).await,
            Store::Rest(store) => store.create_account(account).await,
        }
    }

    pub async fn count_accounts(&self) -> Result<usize, StoreError> {
        match self {
            Store::Memory(store) => store.count_accounts(),
            Store::File(store) => store.count_accounts().await,
            Store::Rest(store) => store.count_accounts().await,
        }
    }

    pub async fn link_character(
        &self,
        username: &str,
        character_id: CharacterId,
    ) -> Result<(), StoreError> {
        match self {
            Store::Memory(store) => store.link_character(username, character_id),
            Store::File(store) => store.link_character(username, character_id).await,
            Store::Rest(store) => store.link_character(username, character_id).await,
        }
    }

    pub async fn load_character(&self, id: CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        match self {
            Store::Memory(store) => store.load_character(id),
            Store::File(store) => store.load_character(id).await,
            Store::Rest(store) => store.load_character(id).await,
        }
    }

    pub async fn save_character(&self, record: &CharacterRecord) -> Result<(), StoreError> {
        match self {
            Store::Memory(store) => store.save_character(record),
            Store::File(store) => store.save_character(record).await,
            Store::Rest(store) => store.save_character(record).await,
        }
    }
}
