//! The world engine: one task owning the world, sessions and output
//!
//! Transports and the persistence worker talk to it over channels only.
//! Input lines are dispatched synchronously as they arrive; everything
//! time-driven happens in `tick`.

mod admin;
mod ai;
mod combat;
mod dispatch;
mod login;
pub mod scheduler;
pub mod stats;

#[cfg(test)]
mod tests;

use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::GameRules;
use crate::game::character::Character;
use crate::game::combat::CombatRules;
use crate::game::command::TableError;
use crate::game::status::{self, StatusContext};
use crate::game::{CharacterId, CommandTable, RoomId, World};
use crate::net::NetEvent;
use crate::session::{OutputCoordinator, Session, SessionId, SessionManager};
use crate::store::records::CharacterRecord;
use crate::store::{PersistNotice, PersistRequest};
use crate::util::sanitize::{clean_line, MAX_LINE_LEN};

pub use scheduler::{TickReport, TickTimer};
pub use stats::{shared_stats, ServerStats, SharedStats};

/// Reasons an engine cannot be built around a world
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Commands(#[from] TableError),

    #[error("start room {0} does not exist")]
    MissingStartRoom(RoomId),

    #[error("respawn room {0} must exist and be a safe zone")]
    UnsafeRespawnRoom(RoomId),
}

const WELCOME_BANNER: &str = "Welcome to Tickworld!\nEnter your username, or 'register' to create an account.";

pub struct Engine {
    world: World,
    sessions: SessionManager,
    output: OutputCoordinator,
    commands: CommandTable,
    rules: GameRules,
    combat_rules: CombatRules,
    rng: ChaCha8Rng,
    tick: u64,
    persist: mpsc::UnboundedSender<PersistRequest>,
    stats: SharedStats,
    lines_handled: u64,
    overruns: u64,
    last_tick_micros: u64,
    last_tick_at: Option<Instant>,
}

impl Engine {
    /// Build an engine around a loaded world; fails if the verb table is
    /// incomplete or the start and respawn rooms are unusable
    pub fn new(
        world: World,
        rules: GameRules,
        persist: mpsc::UnboundedSender<PersistRequest>,
        stats: SharedStats,
        seed: u64,
    ) -> Result<Self, EngineError> {
        let commands = CommandTable::build()?;
        if world.room(rules.start_room).is_none() {
            return Err(EngineError::MissingStartRoom(rules.start_room));
        }
        if !world.safe_zone(rules.respawn_room) {
            return Err(EngineError::UnsafeRespawnRoom(rules.respawn_room));
        }
        let combat_rules = CombatRules {
            flee_chance: rules.flee_chance,
            ..CombatRules::default()
        };
        Ok(Self {
            world,
            sessions: SessionManager::new(),
            output: OutputCoordinator::new(rules.heartbeat),
            commands,
            rules,
            combat_rules,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            persist,
            stats,
            lines_handled: 0,
            overruns: 0,
            last_tick_micros: 0,
            last_tick_at: None,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    // ------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------

    pub fn handle_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Connected {
                session_id,
                peer,
                handle,
            } => {
                if self.sessions.len() >= self.rules.max_players {
                    warn!(session_id = %session_id, peer = %peer, "Server full, refusing connection");
                    let _ = handle.send_frame("The world is full. Please try again later.\n".to_string());
                    let _ = handle.close();
                    return;
                }
                info!(session_id = %session_id, peer = %peer, "Session opened");
                self.sessions
                    .insert(Session::new(session_id, peer, handle, self.tick));
                self.send(session_id, WELCOME_BANNER);
                self.send(session_id, "Username:");
            }
            NetEvent::Line { session_id, line } => self.handle_line(session_id, &line),
            NetEvent::Throttled { session_id } => {
                self.send(session_id, "You are typing too fast. Slow down.");
            }
            NetEvent::Disconnected { session_id } => {
                if let Some(session) = self.sessions.get_mut(session_id) {
                    debug!(session_id = %session_id, "Transport closed, reaping at next tick");
                    session.dead = true;
                }
            }
        }
    }

    /// Interpret one input line from a session
    pub fn handle_line(&mut self, session_id: SessionId, raw: &str) {
        let tick = self.tick;
        let (playing, character) = match self.sessions.get_mut(session_id) {
            Some(session) if !session.dead && !session.closing => {
                session.last_input_tick = tick;
                (session.is_playing(), session.character)
            }
            _ => return,
        };
        self.lines_handled += 1;

        match (playing, character) {
            (true, Some(character_id)) => {
                let line = clean_line(raw, MAX_LINE_LEN);
                self.dispatch(session_id, character_id, &line);
            }
            _ => self.handle_login_line(session_id, raw),
        }
    }

    pub fn handle_notice(&mut self, notice: PersistNotice) {
        match notice {
            PersistNotice::AccountLoaded {
                session_id,
                username,
                account,
            } => self.on_account_loaded(session_id, &username, account),
            PersistNotice::AccountCreated { session_id, account } => {
                self.on_account_created(session_id, account)
            }
            PersistNotice::CharacterLoaded {
                session_id,
                character_id,
                record,
            } => self.on_character_loaded(session_id, character_id, record.map(|r| r.character)),
            PersistNotice::CharacterSaved { character_id } => {
                debug!(character_id = %character_id, "Character saved");
            }
            PersistNotice::WorldSaved => info!("World saved"),
            PersistNotice::Failed {
                session_id,
                operation,
                error,
            } => self.on_persist_failed(session_id, operation, &error),
        }
    }

    // ------------------------------------------------------------------
    // Output helpers
    // ------------------------------------------------------------------

    /// Queue text for one session; it goes out with the next flush
    fn send(&mut self, session_id: SessionId, text: impl Into<String>) {
        if let Some(session) = self.sessions.get_mut(session_id) {
            OutputCoordinator::enqueue(session, text);
        }
    }

    fn send_to_character(&mut self, character: CharacterId, text: impl Into<String>) {
        if let Some(session_id) = self.sessions.session_for_character(character) {
            self.send(session_id, text);
        }
    }

    fn mark_status_dirty(&mut self, character: CharacterId) {
        if let Some(session) = self
            .sessions
            .session_for_character(character)
            .and_then(|id| self.sessions.get_mut(id))
        {
            OutputCoordinator::mark_status_dirty(session);
        }
    }

    /// Fan text out to everyone in a room except `except`
    fn broadcast_room(&mut self, room: RoomId, except: Option<CharacterId>, text: &str) {
        for character in self.world.characters_in_room(room) {
            if Some(character) != except {
                self.send_to_character(character, text);
            }
        }
    }

    fn broadcast_all(&mut self, text: &str) {
        for session in self.sessions.iter_mut().filter(|s| s.is_playing()) {
            OutputCoordinator::enqueue(session, text);
        }
    }

    fn character_name(&self, id: CharacterId) -> String {
        self.world
            .character(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "Someone".to_string())
    }

    /// Full room description as seen by `viewer`
    fn describe_room(&self, viewer: CharacterId) -> String {
        let Some(room_id) = self.world.character(viewer).map(|c| c.room) else {
            return "You are in a void...".to_string();
        };
        let Some(room) = self.world.room(room_id) else {
            return "You are in a void...".to_string();
        };

        let mut lines = vec![room.name.clone()];
        if !room.description.is_empty() {
            lines.push(room.description.clone());
        }
        lines.push(format!("Exits: {}", self.world.exit_names(room_id)));

        let others: Vec<String> = self
            .world
            .characters_in_room(room_id)
            .into_iter()
            .filter(|id| *id != viewer)
            .filter_map(|id| self.world.character(id))
            .map(|c| {
                if c.resting {
                    format!("{} (resting)", c.name)
                } else {
                    c.name.clone()
                }
            })
            .collect();
        if !others.is_empty() {
            lines.push(format!("Players here: {}", others.join(", ")));
        }

        let monsters: Vec<String> = room
            .monsters
            .iter()
            .filter_map(|id| {
                let monster = self.world.monster(*id)?;
                let max = self
                    .world
                    .template_of(*id)
                    .map(|t| t.max_health)
                    .unwrap_or(monster.health);
                Some(format!("{} ({}/{} HP)", monster.name, monster.health, max))
            })
            .collect();
        if !monsters.is_empty() {
            lines.push(format!("Monsters: {}", monsters.join(", ")));
        }

        let items = self.world.visible_items(room_id);
        if !items.is_empty() {
            lines.push(format!("Items: {}", items.join(", ")));
        }
        lines.join("\n")
    }

    // ------------------------------------------------------------------
    // Persistence helpers
    // ------------------------------------------------------------------

    fn request(&self, request: PersistRequest) {
        if self.persist.send(request).is_err() {
            warn!("Persistence worker gone, request dropped");
        }
    }

    fn save_character(&self, id: CharacterId) {
        if let Some(character) = self.world.character(id) {
            self.request(PersistRequest::SaveCharacter(Box::new(
                CharacterRecord::snapshot(character),
            )));
        }
    }

    fn save_everything(&self) {
        for character in self.world.characters() {
            self.request(PersistRequest::SaveCharacter(Box::new(
                CharacterRecord::snapshot(character),
            )));
        }
        self.request(PersistRequest::SaveWorld(Box::new(self.world.to_file())));
    }

    // ------------------------------------------------------------------
    // Entering and leaving the world
    // ------------------------------------------------------------------

    /// Place a loaded or freshly created character in the world and bind it
    pub fn enter_world(&mut self, session_id: SessionId, mut character: Character) {
        if self.world.room(character.room).is_none() {
            warn!(room = character.room, "Character stored in a missing room, using start room");
            character.room = self.rules.start_room;
        }
        if character.is_dead() {
            character.respawn(self.rules.respawn_room);
        }
        character.resting = false;

        let id = character.id;
        let name = character.name.clone();
        let room = character.room;
        if let Err(err) = self.world.insert_character(character) {
            warn!(session_id = %session_id, error = %err, "Could not place character");
            self.send(session_id, "Your character could not enter the world.");
            if let Some(session) = self.sessions.get_mut(session_id) {
                session.closing = true;
            }
            return;
        }

        self.sessions.bind_character(session_id, id);
        info!(session_id = %session_id, character = %name, room, "Character entered the world");

        self.send(session_id, format!("Welcome, {}!", name));
        let description = self.describe_room(id);
        self.send(session_id, description);
        self.broadcast_room(room, Some(id), &format!("{} has entered the world.", name));
    }

    /// Take a character out of the world, resolving any fight as a flee
    fn leave_world(&mut self, id: CharacterId) {
        if self.world.combat(id).is_some() {
            self.abandon_combat(id);
        }
        self.save_character(id);
        if let Some(character) = self.world.remove_character(id) {
            info!(character = %character.name, "Character left the world");
            self.broadcast_room(
                character.room,
                None,
                &format!("{} has left the world.", character.name),
            );
        }
    }
}

/// Render the prompt for a bound character
fn status_prompt(world: &World, character: Option<CharacterId>) -> Option<String> {
    let character = world.character(character?)?;
    let exits = world.exit_names(character.room);
    let ctx = StatusContext {
        character,
        room_name: world.room_name(character.room),
        exits: &exits,
    };
    Some(status::prompt(&status::render(&character.status_template, &ctx)))
}
