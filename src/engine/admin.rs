//! Admin commands (`/` prefix)

use tracing::info;

use super::Engine;
use crate::game::command::{AdminCommand, CommandError};
use crate::game::{CharacterId, RoomId};
use crate::session::SessionId;
use crate::util::time::uptime_secs;

impl Engine {
    pub(super) fn admin(
        &mut self,
        session_id: SessionId,
        id: CharacterId,
        command: AdminCommand,
    ) -> Result<(), CommandError> {
        let admin = self.character_name(id);
        info!(target: "admin", admin = %admin, command = ?command, tick = self.tick, "Admin command");

        match command {
            AdminCommand::Help => {
                let text = self.commands.admin_help();
                self.send(session_id, text);
            }
            AdminCommand::Teleport { player, room } => {
                let target = self.find_online(&player)?;
                self.teleport(target, room)?;
                let name = self.character_name(target);
                self.send(session_id, format!("Teleported {} to room {}.", name, room));
            }
            AdminCommand::Goto(room) => {
                self.teleport(id, room)?;
            }
            AdminCommand::SpawnMonster { template, ticks } => {
                let room = self.room_of(id)?;
                let expires_at = ticks.map(|t| self.tick.saturating_add(t.max(1)));
                let monster = self
                    .world
                    .spawn_monster(&template, room, expires_at)
                    .map_err(|err| CommandError::validation(err.to_string()))?;
                let name = self
                    .world
                    .monster(monster)
                    .map(|m| m.name.clone())
                    .unwrap_or(template);
                info!(target: "admin", monster = %monster, room, ?expires_at, "Monster spawned");
                self.broadcast_room(room, None, &format!("A {} appears in a puff of smoke!", name));
            }
            AdminCommand::SpawnItem(template) => {
                let room = self.room_of(id)?;
                self.world
                    .spawn_item(room, &template, false)
                    .map_err(|err| CommandError::validation(err.to_string()))?;
                let item = self.world.item_name(&template).to_string();
                self.broadcast_room(room, None, &format!("A {} materialises.", item));
            }
            AdminCommand::Broadcast(message) => {
                self.broadcast_all(&format!("[Broadcast] {}", message));
            }
            AdminCommand::ServerStats => {
                let text = [
                    format!("Tick: {}  Uptime: {}s", self.tick, uptime_secs()),
                    format!(
                        "Sessions: {}  Players: {}",
                        self.sessions.len(),
                        self.sessions.playing_count()
                    ),
                    format!(
                        "Rooms: {}  Monsters: {}  Combats: {}",
                        self.world.room_count(),
                        self.world.monster_count(),
                        self.world.combat_count()
                    ),
                    format!(
                        "Lines handled: {}  Tick overruns: {}  Last tick: {}us",
                        self.lines_handled, self.overruns, self.last_tick_micros
                    ),
                ]
                .join("\n");
                self.send(session_id, text);
            }
            AdminCommand::Kick(player) => {
                let target = self.find_online(&player)?;
                if target == id {
                    return Err(CommandError::validation("You cannot kick yourself."));
                }
                let name = self.character_name(target);
                let target_session = self
                    .sessions
                    .session_for_character(target)
                    .ok_or_else(|| CommandError::validation(format!("{} is not connected.", name)))?;
                self.send(target_session, "You have been kicked from the server.");
                if let Some(session) = self.sessions.get_mut(target_session) {
                    session.closing = true;
                }
                info!(target: "admin", admin = %admin, player = %name, "Player kicked");
                self.send(session_id, format!("Kicked {}.", name));
            }
            AdminCommand::ListRooms => {
                let mut lines = vec![format!("Rooms ({}):", self.world.room_count())];
                lines.extend(self.world.rooms().map(|room| {
                    format!(
                        "  {:>4}  {}{}  [{}]",
                        room.id,
                        room.name,
                        if room.safe_zone { " (safe)" } else { "" },
                        self.world.exit_names(room.id)
                    )
                }));
                self.send(session_id, lines.join("\n"));
            }
            AdminCommand::ListMonsters => {
                let templates: Vec<&str> = self
                    .world
                    .monster_templates()
                    .map(|t| t.key.as_str())
                    .collect();
                let mut lines = vec![
                    format!("Templates: {}", templates.join(", ")),
                    format!("Monsters ({}):", self.world.monster_count()),
                ];
                lines.extend(self.world.monsters().map(|m| {
                    let mut line = format!(
                        "  {}  {} ({} HP) in {} [{}]",
                        m.id,
                        m.name,
                        m.health,
                        m.room,
                        self.world.room_name(m.room)
                    );
                    if let Some(target) = m.engaged_with {
                        line.push_str(&format!(" fighting {}", self.character_name(target)));
                    }
                    if let Some(at) = m.expires_at {
                        line.push_str(&format!(" expires at tick {}", at));
                    }
                    line
                }));
                self.send(session_id, lines.join("\n"));
            }
            AdminCommand::SaveWorld => {
                self.save_everything();
                self.send(session_id, "World save requested.");
            }
            AdminCommand::Heal(player) => {
                let target = match player {
                    Some(player) => self.find_online(&player)?,
                    None => id,
                };
                let character = self
                    .world
                    .character_mut(target)
                    .ok_or_else(|| CommandError::validation("That player is not online."))?;
                character.health = character.max_health;
                character.mana = character.max_mana;
                let name = character.name.clone();
                self.mark_status_dirty(target);
                if target != id {
                    self.send_to_character(target, "You feel a divine warmth restore you.");
                }
                self.send(session_id, format!("{} has been fully healed.", name));
            }
        }
        Ok(())
    }

    fn find_online(&self, player: &str) -> Result<CharacterId, CommandError> {
        self.world
            .find_character(player)
            .ok_or_else(|| CommandError::validation(format!("No player named '{}' is online.", player)))
    }

    fn room_of(&self, id: CharacterId) -> Result<RoomId, CommandError> {
        self.world
            .character(id)
            .map(|c| c.room)
            .ok_or_else(|| CommandError::validation("You are not in the world."))
    }

    /// Move a character anywhere, ending any fight as a flee first
    fn teleport(&mut self, target: CharacterId, room: RoomId) -> Result<(), CommandError> {
        if self.world.room(room).is_none() {
            return Err(CommandError::validation(format!("Room {} does not exist.", room)));
        }
        if self.world.combat(target).is_some() {
            self.abandon_combat(target);
        }
        let name = self.character_name(target);
        let target_session = self
            .sessions
            .session_for_character(target)
            .ok_or_else(|| CommandError::validation(format!("{} is not connected.", name)))?;
        self.relocate(
            target_session,
            target,
            room,
            &format!("{} vanishes in a flash of light.", name),
            &format!("{} appears in a flash of light.", name),
        )
    }
}
