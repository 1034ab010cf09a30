//! JSON documents on disk
//!
//! Layout under the data directory:
//! `accounts/<username>.json`, `characters/<uuid>.json`, plus the world file.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;

use super::records::{AccountRecord, CharacterRecord, WorldFile};
use super::StoreError;
use crate::game::CharacterId;

#[derive(Debug, Clone)]
pub struct FileStore {
    accounts_dir: PathBuf,
    characters_dir: PathBuf,
    world_file: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: &Path, world_file: &Path) -> Self {
        Self {
            accounts_dir: data_dir.join("accounts"),
            characters_dir: data_dir.join("characters"),
            world_file: world_file.to_path_buf(),
        }
    }

    fn account_path(&self, username: &str) -> PathBuf {
        self.accounts_dir.join(format!("{}.json", username))
    }

    fn character_path(&self, id: CharacterId) -> PathBuf {
        self.characters_dir.join(format!("{}.json", id))
    }

    pub async fn load_world(&self) -> Result<WorldFile, StoreError> {
        match read_json(&self.world_file).await? {
            Some(world) => Ok(world),
            None => Err(StoreError::WorldMissing),
        }
    }

    pub async fn save_world(&self, world: &WorldFile) -> Result<(), StoreError> {
        write_json(&self.world_file, world).await
    }

    pub async fn load_account(&self, username: &str) -> Result<Option<AccountRecord>, StoreError> {
        read_json(&self.account_path(username)).await
    }

    pub async fn create_account(&self, account: &AccountRecord) -> Result<bool, StoreError> {
        let path = self.account_path(&account.username);
        if fs::try_exists(&path).await? {
            return Ok(false);
        }
        write_json(&path, account).await?;
        Ok(true)
    }

    pub async fn count_accounts(&self) -> Result<usize, StoreError> {
        let mut entries = match fs::read_dir(&self.accounts_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }

    pub async fn link_character(
        &self,
        username: &str,
        character_id: CharacterId,
    ) -> Result<(), StoreError> {
        let path = self.account_path(username);
        let mut account: AccountRecord = read_json(&path)
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("no account {}", username)))?;
        account.character_id = Some(character_id);
        write_json(&path, &account).await
    }

    pub async fn load_character(&self, id: CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        read_json(&self.character_path(id)).await
    }

    pub async fn save_character(&self, record: &CharacterRecord) -> Result<(), StoreError> {
        write_json(&self.character_path(record.character.id), record).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Write to a sibling temp file then rename over the target
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
