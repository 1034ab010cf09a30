//! Persistence worker task
//!
//! Consumes requests from the engine, talks to the store with retries and
//! posts completion notices back. It never touches the live world.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::records::{AccountRecord, CharacterRecord, WorldFile, ADMIN_ACCESS_LEVEL};
use super::{Store, StoreError};
use crate::game::CharacterId;
use crate::session::SessionId;

pub const MAX_ATTEMPTS: u32 = 5;
pub const BACKOFF_BASE: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub enum PersistRequest {
    LoadAccount {
        session_id: SessionId,
        username: String,
    },
    CreateAccount {
        session_id: SessionId,
        record: AccountRecord,
    },
    LoadCharacter {
        session_id: SessionId,
        character_id: CharacterId,
    },
    SaveCharacter(Box<CharacterRecord>),
    LinkCharacter {
        username: String,
        character_id: CharacterId,
    },
    SaveWorld(Box<WorldFile>),
}

#[derive(Debug)]
pub enum PersistNotice {
    AccountLoaded {
        session_id: SessionId,
        username: String,
        account: Option<AccountRecord>,
    },
    /// `account` is `None` when the username was already taken
    AccountCreated {
        session_id: SessionId,
        account: Option<AccountRecord>,
    },
    CharacterLoaded {
        session_id: SessionId,
        character_id: CharacterId,
        record: Option<Box<CharacterRecord>>,
    },
    CharacterSaved {
        character_id: CharacterId,
    },
    WorldSaved,
    Failed {
        session_id: Option<SessionId>,
        operation: &'static str,
        error: String,
    },
}

pub struct PersistenceWorker {
    store: Store,
    requests: mpsc::UnboundedReceiver<PersistRequest>,
    notices: mpsc::UnboundedSender<PersistNotice>,
    backoff: Duration,
}

impl PersistenceWorker {
    pub fn new(
        store: Store,
        requests: mpsc::UnboundedReceiver<PersistRequest>,
        notices: mpsc::UnboundedSender<PersistNotice>,
    ) -> Self {
        Self {
            store,
            requests,
            notices,
            backoff: BACKOFF_BASE,
        }
    }

    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff = base;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until every request sender is dropped and the queue is drained
    pub async fn run(mut self) {
        info!(backend = self.store.backend_name(), "Persistence worker started");
        while let Some(request) = self.requests.recv().await {
            let notice = self.handle(request).await;
            if let Some(notice) = notice {
                if self.notices.send(notice).is_err() {
                    debug!("Engine gone, dropping persistence notice");
                }
            }
        }
        info!("Persistence worker drained");
    }

    async fn handle(&self, request: PersistRequest) -> Option<PersistNotice> {
        let store = &self.store;
        let backoff = self.backoff;
        match request {
            PersistRequest::LoadAccount { session_id, username } => {
                let result = retry("load_account", backoff, || store.load_account(&username)).await;
                match result {
                    Ok(account) => Some(PersistNotice::AccountLoaded {
                        session_id,
                        username,
                        account,
                    }),
                    Err(err) => Some(failed(Some(session_id), "load_account", err)),
                }
            }
            PersistRequest::CreateAccount { session_id, mut record } => {
                let existing = match retry("count_accounts", backoff, || store.count_accounts()).await {
                    Ok(count) => count,
                    Err(err) => return Some(failed(Some(session_id), "create_account", err)),
                };
                if existing == 0 {
                    record.access_level = ADMIN_ACCESS_LEVEL;
                    info!(username = %record.username, "First account registered, granting admin");
                }
                let result = retry("create_account", backoff, || store.create_account(&record)).await;
                match result {
                    Ok(true) => Some(PersistNotice::AccountCreated {
                        session_id,
                        account: Some(record),
                    }),
                    Ok(false) => Some(PersistNotice::AccountCreated {
                        session_id,
                        account: None,
                    }),
                    Err(err) => Some(failed(Some(session_id), "create_account", err)),
                }
            }
            PersistRequest::LoadCharacter {
                session_id,
                character_id,
            } => match retry("load_character", backoff, || store.load_character(character_id)).await {
                Ok(record) => Some(PersistNotice::CharacterLoaded {
                    session_id,
                    character_id,
                    record: record.map(Box::new),
                }),
                Err(err) => Some(failed(Some(session_id), "load_character", err)),
            },
            PersistRequest::SaveCharacter(record) => {
                let character_id = record.character.id;
                match retry("save_character", backoff, || store.save_character(&record)).await {
                    Ok(()) => Some(PersistNotice::CharacterSaved { character_id }),
                    Err(err) => Some(failed(None, "save_character", err)),
                }
            }
            PersistRequest::LinkCharacter {
                username,
                character_id,
            } => match retry("link_character", backoff, || {
                store.link_character(&username, character_id)
            })
            .await
            {
                Ok(()) => None,
                Err(err) => Some(failed(None, "link_character", err)),
            },
            PersistRequest::SaveWorld(world) => {
                match retry("save_world", backoff, || store.save_world(&world)).await {
                    Ok(()) => Some(PersistNotice::WorldSaved),
                    Err(err) => Some(failed(None, "save_world", err)),
                }
            }
        }
    }
}

fn failed(session_id: Option<SessionId>, operation: &'static str, err: StoreError) -> PersistNotice {
    error!(operation, error = %err, "Persistence failed after retries");
    PersistNotice::Failed {
        session_id,
        operation,
        error: err.to_string(),
    }
}

/// Exponential backoff: base, 2x base, 4x base ... for up to `MAX_ATTEMPTS`
async fn retry<T, F, Fut>(operation: &'static str, base: Duration, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = base;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS => {
                warn!(operation, attempt, error = %err, "Persistence attempt failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::sample_character;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn account(name: &str) -> AccountRecord {
        AccountRecord {
            username: name.to_string(),
            password_hash: "00".to_string(),
            salt: "11".to_string(),
            access_level: 1,
            character_id: None,
            created_at: Utc::now(),
        }
    }

    fn start(
        memory: &MemoryStore,
    ) -> (
        mpsc::UnboundedSender<PersistRequest>,
        mpsc::UnboundedReceiver<PersistNotice>,
        JoinHandle<()>,
    ) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (note_tx, note_rx) = mpsc::unbounded_channel();
        let handle = PersistenceWorker::new(Store::Memory(memory.clone()), req_rx, note_tx)
            .with_backoff(Duration::from_millis(1))
            .spawn();
        (req_tx, note_rx, handle)
    }

    #[tokio::test]
    async fn first_account_becomes_admin() {
        let memory = MemoryStore::new();
        let (tx, mut rx, _handle) = start(&memory);

        tx.send(PersistRequest::CreateAccount {
            session_id: SessionId(1),
            record: account("root"),
        })
        .unwrap();
        tx.send(PersistRequest::CreateAccount {
            session_id: SessionId(2),
            record: account("guest"),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            PersistNotice::AccountCreated { account: Some(acc), .. } => {
                assert_eq!(acc.access_level, ADMIN_ACCESS_LEVEL)
            }
            other => panic!("unexpected notice {:?}", other),
        }
        match rx.recv().await.unwrap() {
            PersistNotice::AccountCreated { account: Some(acc), .. } => assert_eq!(acc.access_level, 1),
            other => panic!("unexpected notice {:?}", other),
        }
    }

    #[tokio::test]
    async fn duplicate_registration_reports_taken() {
        let memory = MemoryStore::new();
        memory.create_account(&account("alice")).unwrap();
        let (tx, mut rx, _handle) = start(&memory);

        tx.send(PersistRequest::CreateAccount {
            session_id: SessionId(3),
            record: account("alice"),
        })
        .unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            PersistNotice::AccountCreated { account: None, .. }
        ));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let memory = MemoryStore::new();
        memory.fail_next(MAX_ATTEMPTS - 1);
        let (tx, mut rx, _handle) = start(&memory);

        let hero = sample_character("Hero", 1);
        tx.send(PersistRequest::SaveCharacter(Box::new(CharacterRecord::snapshot(&hero))))
            .unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            PersistNotice::CharacterSaved { character_id } if character_id == hero.id
        ));
        assert_eq!(memory.character_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_post_failure() {
        let memory = MemoryStore::new();
        memory.fail_next(MAX_ATTEMPTS);
        let (tx, mut rx, _handle) = start(&memory);

        tx.send(PersistRequest::LoadAccount {
            session_id: SessionId(9),
            username: "ghost".to_string(),
        })
        .unwrap();
        match rx.recv().await.unwrap() {
            PersistNotice::Failed {
                session_id,
                operation,
                ..
            } => {
                assert_eq!(session_id, Some(SessionId(9)));
                assert_eq!(operation, "load_account");
            }
            other => panic!("unexpected notice {:?}", other),
        }
    }

    #[tokio::test]
    async fn worker_drains_and_exits_when_senders_drop() {
        let memory = MemoryStore::new();
        let (tx, mut rx, handle) = start(&memory);
        tx.send(PersistRequest::SaveWorld(Box::default())).unwrap();
        drop(tx);
        handle.await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), PersistNotice::WorldSaved));
    }
}
