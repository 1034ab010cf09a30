//! Player command dispatch
//!
//! Every handler mutates the world synchronously and enqueues its text.
//! Handlers never emit the status line; that belongs to the tick flush.

use rand::Rng;
use tracing::{debug, info, warn};

use super::Engine;
use crate::game::character::{ActionKind, EquipSlot};
use crate::game::command::{Action, CommandError, StatusLineCommand};
use crate::game::status::{self, StatusContext, DEFAULT_STATUS_TEMPLATE};
use crate::game::world::ItemKind;
use crate::game::{CharacterId, Direction, RoomId};
use crate::session::SessionId;

fn not_in_world() -> CommandError {
    CommandError::validation("You are not in the world.")
}

fn on_cooldown(kind: ActionKind) -> CommandError {
    CommandError::validation(format!("You must wait before you can {} again.", kind))
}

/// Chance that `search` uncovers hidden items
pub(crate) fn search_chance(intelligence: i32) -> f64 {
    (0.3 + 0.05 * f64::from(intelligence - 10)).clamp(0.0, 0.9)
}

impl Engine {
    /// Parse and perform one line from a playing session
    pub(super) fn dispatch(&mut self, session_id: SessionId, id: CharacterId, line: &str) {
        let action = match self.commands.parse(line) {
            Ok(action) => action,
            Err(err) => {
                debug!(session_id = %session_id, kind = err.kind(), "Rejected input");
                self.send(session_id, err.to_string());
                return;
            }
        };

        if !action.keeps_resting() {
            if let Some(character) = self.world.character_mut(id) {
                if character.resting {
                    character.resting = false;
                    self.send(session_id, "You stop resting.");
                }
            }
        }

        if let Err(err) = self.perform(session_id, id, action) {
            debug!(session_id = %session_id, kind = err.kind(), error = %err, "Command failed");
            self.send(session_id, err.to_string());
        }
        self.mark_status_dirty(id);
    }

    fn perform(&mut self, session_id: SessionId, id: CharacterId, action: Action) -> Result<(), CommandError> {
        match action {
            Action::Look => {
                let description = self.describe_room(id);
                self.send(session_id, description);
                Ok(())
            }
            Action::Move(direction) => self.walk(session_id, id, direction),
            Action::Attack(target) => self.start_combat(session_id, id, &target),
            Action::Flee => self.flee(id),
            Action::Say(message) => self.say(session_id, id, &message),
            Action::Rest => self.rest(session_id, id),
            Action::Stand => self.stand(session_id, id),
            Action::Stats => {
                let sheet = self.character_sheet(id)?;
                self.send(session_id, sheet);
                Ok(())
            }
            Action::Inventory => {
                let listing = self.inventory_listing(id)?;
                self.send(session_id, listing);
                Ok(())
            }
            Action::Get(name) => self.get_item(session_id, id, &name),
            Action::Drop(name) => self.drop_item(session_id, id, &name),
            Action::Equip(name) => self.equip(session_id, id, &name),
            Action::Unequip(name) => self.unequip(session_id, id, &name),
            Action::Use(name) => self.use_item(session_id, id, &name),
            Action::Search => self.search(session_id, id),
            Action::Who => {
                let listing = self.who_listing();
                self.send(session_id, listing);
                Ok(())
            }
            Action::Help(topic) => {
                let text = self.commands.help(topic.as_deref())?;
                self.send(session_id, text);
                Ok(())
            }
            Action::StatusLine(command) => self.status_line(session_id, id, command),
            Action::Quit => self.quit(session_id, id),
            Action::Admin(command) => {
                let level = self
                    .sessions
                    .get(session_id)
                    .map(|s| s.access_level())
                    .unwrap_or(0);
                if level < self.rules.min_admin_level {
                    warn!(session_id = %session_id, level, "Admin command without access");
                    return Err(CommandError::validation(
                        "You do not have permission to do that.",
                    ));
                }
                self.admin(session_id, id, command)
            }
        }
    }

    // ------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------

    fn walk(&mut self, session_id: SessionId, id: CharacterId, direction: Direction) -> Result<(), CommandError> {
        let tick = self.tick;
        let character = self.world.character(id).ok_or_else(not_in_world)?;
        let cooling = character.cooldown_remaining(ActionKind::Move, tick).is_some();
        let name = character.name.clone();
        let to = self.world.exit(character.room, direction).ok_or_else(|| {
            CommandError::zone(format!("There is no exit {} from here.", direction))
        })?;

        // mid-fight, walking out is a flee attempt through that exit
        if self.world.combat(id).is_some() {
            return self.flee_toward(id, Some(direction));
        }
        if cooling {
            return Err(on_cooldown(ActionKind::Move));
        }

        self.relocate(
            session_id,
            id,
            to,
            &format!("{} leaves {}.", name, direction),
            &format!("{} arrives.", name),
        )?;
        let cooldown = self.rules.move_cooldown;
        if let Some(character) = self.world.character_mut(id) {
            character.start_cooldown(ActionKind::Move, tick, cooldown);
        }
        Ok(())
    }

    /// Move a character, tell both rooms and show the new one
    pub(super) fn relocate(
        &mut self,
        session_id: SessionId,
        id: CharacterId,
        to: RoomId,
        departure: &str,
        arrival: &str,
    ) -> Result<(), CommandError> {
        let from = self
            .world
            .move_character(id, to)
            .map_err(|err| CommandError::validation(err.to_string()))?;
        self.broadcast_room(from, Some(id), departure);
        self.broadcast_room(to, Some(id), arrival);
        let description = self.describe_room(id);
        self.send(session_id, description);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Social and resting
    // ------------------------------------------------------------------

    fn say(&mut self, session_id: SessionId, id: CharacterId, message: &str) -> Result<(), CommandError> {
        let character = self.world.character(id).ok_or_else(not_in_world)?;
        let (name, room) = (character.name.clone(), character.room);
        self.send(session_id, format!("You say: {}", message));
        self.broadcast_room(room, Some(id), &format!("{} says: {}", name, message));
        Ok(())
    }

    fn rest(&mut self, session_id: SessionId, id: CharacterId) -> Result<(), CommandError> {
        if self.world.combat(id).is_some() {
            return Err(CommandError::combat_state("You cannot rest while fighting!"));
        }
        let character = self.world.character_mut(id).ok_or_else(not_in_world)?;
        if character.resting {
            return Err(CommandError::validation("You are already resting."));
        }
        character.resting = true;
        let (name, room) = (character.name.clone(), character.room);
        self.send(session_id, "You sit down and rest.");
        self.broadcast_room(room, Some(id), &format!("{} sits down to rest.", name));
        Ok(())
    }

    fn stand(&mut self, session_id: SessionId, id: CharacterId) -> Result<(), CommandError> {
        let character = self.world.character_mut(id).ok_or_else(not_in_world)?;
        if !character.resting {
            return Err(CommandError::validation("You are already standing."));
        }
        character.resting = false;
        let (name, room) = (character.name.clone(), character.room);
        self.send(session_id, "You stand up.");
        self.broadcast_room(room, Some(id), &format!("{} stands up.", name));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Information
    // ------------------------------------------------------------------

    fn character_sheet(&self, id: CharacterId) -> Result<String, CommandError> {
        let c = self.world.character(id).ok_or_else(not_in_world)?;
        let a = &c.attributes;
        let slot = |key: Option<&String>, bonus: i32| match key {
            Some(key) => format!("{} (+{})", self.world.item_name(key), bonus),
            None => "none".to_string(),
        };
        Ok([
            format!("{} - Level {} {} {}", c.name, c.level, c.race, c.class),
            format!(
                "Health: {}/{}  Mana: {}/{}",
                c.health, c.max_health, c.mana, c.max_mana
            ),
            format!(
                "Experience: {} (next level at {})",
                c.experience,
                c.level.saturating_mul(100)
            ),
            format!(
                "Str {}  Dex {}  Con {}  Int {}  Wis {}  Cha {}",
                a.strength, a.dexterity, a.constitution, a.intelligence, a.wisdom, a.charisma
            ),
            format!(
                "Weapon: {}  Armor: {}",
                slot(c.equipment.weapon.as_ref(), self.world.weapon_bonus(&c.equipment)),
                slot(c.equipment.armor.as_ref(), self.world.armor_bonus(&c.equipment))
            ),
        ]
        .join("\n"))
    }

    fn inventory_listing(&self, id: CharacterId) -> Result<String, CommandError> {
        let c = self.world.character(id).ok_or_else(not_in_world)?;
        if c.inventory.is_empty() {
            return Ok("You are carrying nothing.".to_string());
        }
        let mut weapon = c.equipment.weapon.as_deref();
        let mut armor = c.equipment.armor.as_deref();
        let mut lines = vec!["You are carrying:".to_string()];
        for key in &c.inventory {
            let name = self.world.item_name(key);
            // each equipped key is marked on one inventory entry only
            if weapon == Some(key.as_str()) {
                weapon = None;
                lines.push(format!("  {} (wielded)", name));
            } else if armor == Some(key.as_str()) {
                armor = None;
                lines.push(format!("  {} (worn)", name));
            } else {
                lines.push(format!("  {}", name));
            }
        }
        Ok(lines.join("\n"))
    }

    fn who_listing(&self) -> String {
        let mut online: Vec<_> = self
            .sessions
            .iter()
            .filter(|s| s.is_playing() && !s.dead)
            .filter_map(|s| s.character)
            .filter_map(|id| self.world.character(id))
            .collect();
        online.sort_by(|a, b| a.name.cmp(&b.name));

        let mut lines = vec![format!("Players online ({}):", online.len())];
        lines.extend(online.iter().map(|c| {
            format!(
                "  {} - Level {} {} {} ({})",
                c.name,
                c.level,
                c.race,
                c.class,
                self.world.room_name(c.room)
            )
        }));
        lines.join("\n")
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    fn get_item(&mut self, session_id: SessionId, id: CharacterId, name: &str) -> Result<(), CommandError> {
        let character = self.world.character(id).ok_or_else(not_in_world)?;
        let (who, room) = (character.name.clone(), character.room);
        let key = self
            .world
            .take_item(room, name)
            .ok_or_else(|| CommandError::validation(format!("You don't see '{}' here.", name)))?;
        let item = self.world.item_name(&key).to_string();
        if let Some(character) = self.world.character_mut(id) {
            character.inventory.push(key);
        }
        self.send(session_id, format!("You pick up the {}.", item));
        self.broadcast_room(room, Some(id), &format!("{} picks up the {}.", who, item));
        Ok(())
    }

    fn drop_item(&mut self, session_id: SessionId, id: CharacterId, name: &str) -> Result<(), CommandError> {
        let character = self.world.character(id).ok_or_else(not_in_world)?;
        let key = self
            .world
            .match_item(&character.inventory, name)
            .ok_or_else(|| CommandError::validation(format!("You are not carrying '{}'.", name)))?;
        let (who, room) = (character.name.clone(), character.room);

        let character = self.world.character_mut(id).ok_or_else(not_in_world)?;
        character.take_from_inventory(&key);
        if !character.inventory.contains(&key) {
            for slot in [EquipSlot::Weapon, EquipSlot::Armor] {
                let equipped = character.equipment.slot_mut(slot);
                if equipped.as_deref() == Some(key.as_str()) {
                    *equipped = None;
                }
            }
        }
        self.world
            .spawn_item(room, &key, false)
            .map_err(|err| CommandError::validation(err.to_string()))?;

        let item = self.world.item_name(&key).to_string();
        self.send(session_id, format!("You drop the {}.", item));
        self.broadcast_room(room, Some(id), &format!("{} drops the {}.", who, item));
        Ok(())
    }

    fn equip(&mut self, session_id: SessionId, id: CharacterId, name: &str) -> Result<(), CommandError> {
        let character = self.world.character(id).ok_or_else(not_in_world)?;
        let key = self
            .world
            .match_item(&character.inventory, name)
            .ok_or_else(|| CommandError::validation(format!("You are not carrying '{}'.", name)))?;
        let slot = match self.world.item_template(&key).map(|t| &t.kind) {
            Some(ItemKind::Weapon { .. }) => EquipSlot::Weapon,
            Some(ItemKind::Armor { .. }) => EquipSlot::Armor,
            _ => return Err(CommandError::validation("You cannot equip that.")),
        };
        let item = self.world.item_name(&key).to_string();

        let character = self.world.character_mut(id).ok_or_else(not_in_world)?;
        if character.equipment.slot(slot) == Some(&key) {
            return Err(CommandError::validation(format!(
                "You already have the {} equipped.",
                item
            )));
        }
        *character.equipment.slot_mut(slot) = Some(key);
        self.send(session_id, format!("You equip the {}.", item));
        Ok(())
    }

    fn unequip(&mut self, session_id: SessionId, id: CharacterId, name: &str) -> Result<(), CommandError> {
        let character = self.world.character(id).ok_or_else(not_in_world)?;
        let slot = match name.trim().to_ascii_lowercase().as_str() {
            "weapon" => Some(EquipSlot::Weapon),
            "armor" | "armour" => Some(EquipSlot::Armor),
            _ => {
                let equipped: Vec<String> = [EquipSlot::Weapon, EquipSlot::Armor]
                    .into_iter()
                    .filter_map(|slot| character.equipment.slot(slot).cloned())
                    .collect();
                self.world.match_item(&equipped, name).and_then(|key| {
                    [EquipSlot::Weapon, EquipSlot::Armor]
                        .into_iter()
                        .find(|slot| character.equipment.slot(*slot) == Some(&key))
                })
            }
        };
        let slot = slot
            .filter(|slot| character.equipment.slot(*slot).is_some())
            .ok_or_else(|| CommandError::validation(format!("You have no '{}' equipped.", name)))?;

        let character = self.world.character_mut(id).ok_or_else(not_in_world)?;
        let key = character.equipment.slot_mut(slot).take().unwrap_or_default();
        let item = self.world.item_name(&key).to_string();
        self.send(session_id, format!("You unequip the {}.", item));
        Ok(())
    }

    fn use_item(&mut self, session_id: SessionId, id: CharacterId, name: &str) -> Result<(), CommandError> {
        let tick = self.tick;
        let character = self.world.character(id).ok_or_else(not_in_world)?;
        if character.cooldown_remaining(ActionKind::Use, tick).is_some() {
            return Err(on_cooldown(ActionKind::Use));
        }
        let key = self
            .world
            .match_item(&character.inventory, name)
            .ok_or_else(|| CommandError::validation(format!("You are not carrying '{}'.", name)))?;
        let (health, mana) = match self.world.item_template(&key).map(|t| &t.kind) {
            Some(ItemKind::Potion { health, mana }) => (*health, *mana),
            _ => return Err(CommandError::validation("You cannot use that.")),
        };
        let item = self.world.item_name(&key).to_string();
        let cooldown = self.rules.use_cooldown;

        let character = self.world.character_mut(id).ok_or_else(not_in_world)?;
        character.take_from_inventory(&key);
        let healed = character.heal(health);
        let restored = character.restore_mana(mana);
        character.start_cooldown(ActionKind::Use, tick, cooldown);
        let (who, room) = (character.name.clone(), character.room);

        let mut text = format!("You use the {}.", item);
        if healed > 0 {
            text.push_str(&format!(" You recover {} health.", healed));
        }
        if restored > 0 {
            text.push_str(&format!(" You recover {} mana.", restored));
        }
        self.send(session_id, text);
        self.broadcast_room(room, Some(id), &format!("{} uses a {}.", who, item));
        Ok(())
    }

    fn search(&mut self, session_id: SessionId, id: CharacterId) -> Result<(), CommandError> {
        let tick = self.tick;
        let character = self.world.character(id).ok_or_else(not_in_world)?;
        if character.cooldown_remaining(ActionKind::Search, tick).is_some() {
            return Err(on_cooldown(ActionKind::Search));
        }
        let room = character.room;
        let chance = search_chance(character.attributes.intelligence);
        let cooldown = self.rules.search_cooldown;
        if let Some(character) = self.world.character_mut(id) {
            character.start_cooldown(ActionKind::Search, tick, cooldown);
        }

        if !self.world.has_hidden_items(room) {
            self.send(session_id, "You search the area but find nothing of interest.");
            return Ok(());
        }
        if !self.rng.gen_bool(chance) {
            self.send(session_id, "You search carefully but find nothing.");
            return Ok(());
        }
        let found = self.world.reveal_hidden_items(room);
        self.send(session_id, format!("You found: {}!", found.join(", ")));
        let who = self.character_name(id);
        self.broadcast_room(room, Some(id), &format!("{} discovers something hidden.", who));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Status line and leaving
    // ------------------------------------------------------------------

    fn status_line(&mut self, session_id: SessionId, id: CharacterId, command: StatusLineCommand) -> Result<(), CommandError> {
        match command {
            StatusLineCommand::Show => {
                let character = self.world.character(id).ok_or_else(not_in_world)?;
                let exits = self.world.exit_names(character.room);
                let ctx = StatusContext {
                    character,
                    room_name: self.world.room_name(character.room),
                    exits: &exits,
                };
                let text = format!(
                    "Your status line: {}\nPreview: {}",
                    character.status_template,
                    status::render(&character.status_template, &ctx)
                );
                self.send(session_id, text);
            }
            StatusLineCommand::Set(template) => {
                status::validate(&template)?;
                let character = self.world.character_mut(id).ok_or_else(not_in_world)?;
                character.status_template = template;
                self.send(session_id, "Status line updated.");
            }
            StatusLineCommand::Reset => {
                let character = self.world.character_mut(id).ok_or_else(not_in_world)?;
                character.status_template = DEFAULT_STATUS_TEMPLATE.to_string();
                self.send(session_id, "Status line reset to the default.");
            }
            StatusLineCommand::Help => self.send(session_id, status::help_text()),
        }
        Ok(())
    }

    fn quit(&mut self, session_id: SessionId, id: CharacterId) -> Result<(), CommandError> {
        if self.world.combat(id).is_some() {
            return Err(CommandError::combat_state("You cannot quit while fighting!"));
        }
        self.save_character(id);
        self.send(session_id, "Goodbye! Your progress has been saved.");
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.closing = true;
        }
        info!(session_id = %session_id, character = %self.character_name(id), "Player quit");
        Ok(())
    }
}
