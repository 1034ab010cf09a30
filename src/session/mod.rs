//! Per-connection sessions

pub mod output;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::SocketAddr;

use crate::game::character::Race;
use crate::game::CharacterId;
use crate::net::ConnectionHandle;
use crate::store::AccountRecord;

pub use output::{HeartbeatPolicy, OutputCoordinator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Where a connection is in login and character creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPhase {
    AwaitingUsername,
    AwaitingPassword { username: String },
    /// Password held until the account record arrives
    Verifying { username: String, password: String },
    RegisterUsername,
    RegisterPassword { username: String },
    /// Waiting on the persistence worker
    Loading,
    CreateName,
    CreateRace { name: String },
    CreateClass { name: String, race: Race },
    Playing,
}

pub struct Session {
    pub id: SessionId,
    pub peer: SocketAddr,
    pub handle: ConnectionHandle,
    pub phase: AuthPhase,
    pub account: Option<AccountRecord>,
    pub character: Option<CharacterId>,
    /// Pending lines, drained on flush
    pub buffer: Vec<String>,
    pub last_flushed_tick: Option<u64>,
    pub needs_status: bool,
    pub connected_tick: u64,
    pub last_input_tick: u64,
    /// Close after the next flush
    pub closing: bool,
    /// Transport gone; removed at the next tick boundary
    pub dead: bool,
}

impl Session {
    pub fn new(id: SessionId, peer: SocketAddr, handle: ConnectionHandle, tick: u64) -> Self {
        Self {
            id,
            peer,
            handle,
            phase: AuthPhase::AwaitingUsername,
            account: None,
            character: None,
            buffer: Vec::new(),
            last_flushed_tick: None,
            needs_status: false,
            connected_tick: tick,
            last_input_tick: tick,
            closing: false,
            dead: false,
        }
    }

    pub fn access_level(&self) -> u8 {
        self.account.as_ref().map(|a| a.access_level).unwrap_or(0)
    }

    pub fn username(&self) -> Option<&str> {
        self.account.as_ref().map(|a| a.username.as_str())
    }

    pub fn is_playing(&self) -> bool {
        self.phase == AuthPhase::Playing && self.character.is_some()
    }
}

/// Live sessions keyed by id, with a reverse index from bound characters
#[derive(Default)]
pub struct SessionManager {
    sessions: BTreeMap<SessionId, Session>,
    by_character: HashMap<CharacterId, SessionId>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: Session) {
        if let Some(character) = session.character {
            self.by_character.insert(character, session.id);
        }
        self.sessions.insert(session.id, session);
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        if let Some(character) = session.character {
            if self.by_character.get(&character) == Some(&id) {
                self.by_character.remove(&character);
            }
        }
        Some(session)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn playing_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_playing()).count()
    }

    /// Bind a character and enter the world
    pub fn bind_character(&mut self, id: SessionId, character: CharacterId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.character = Some(character);
            session.phase = AuthPhase::Playing;
            session.needs_status = true;
            self.by_character.insert(character, id);
        }
    }

    pub fn session_for_character(&self, character: CharacterId) -> Option<SessionId> {
        self.by_character.get(&character).copied()
    }

    /// Another live session already logged in as `username`
    pub fn logged_in_as(&self, username: &str, except: SessionId) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|s| s.id != except && !s.dead && s.username() == Some(username))
            .map(|s| s.id)
    }
}
