//! In-process store used by tests and scenario runs

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::records::{AccountRecord, CharacterRecord, WorldFile};
use super::StoreError;
use crate::game::CharacterId;

#[derive(Default)]
struct Inner {
    world: Option<WorldFile>,
    accounts: HashMap<String, AccountRecord>,
    characters: HashMap<CharacterId, CharacterRecord>,
    /// Number of upcoming calls that fail with `Unavailable`
    failures: u32,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` operations fail
    pub fn fail_next(&self, count: u32) {
        self.inner.lock().failures = count;
    }

    fn check(inner: &mut Inner) -> Result<(), StoreError> {
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    pub fn load_world(&self) -> Result<WorldFile, StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner)?;
        inner.world.clone().ok_or(StoreError::WorldMissing)
    }

    pub fn save_world(&self, world: &WorldFile) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner)?;
        inner.world = Some(world.clone());
        Ok(())
    }

    pub fn load_account(&self, username: &str) -> Result<Option<AccountRecord>, StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner)?;
        Ok(inner.accounts.get(username).cloned())
    }

    pub fn create_account(&self, account: &AccountRecord) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner)?;
        if inner.accounts.contains_key(&account.username) {
            return Ok(false);
        }
        inner.accounts.insert(account.username.clone(), account.clone());
        Ok(true)
    }

    pub fn count_accounts(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner)?;
        Ok(inner.accounts.len())
    }

    pub fn link_character(&self, username: &str, character_id: CharacterId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner)?;
        match inner.accounts.get_mut(username) {
            Some(account) => {
                account.character_id = Some(character_id);
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!("no account {}", username))),
        }
    }

    pub fn load_character(&self, id: CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner)?;
        Ok(inner.characters.get(&id).cloned())
    }

    pub fn save_character(&self, record: &CharacterRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&mut inner)?;
        inner.characters.insert(record.character.id, record.clone());
        Ok(())
    }

    pub fn character_count(&self) -> usize {
        self.inner.lock().characters.len()
    }
}
