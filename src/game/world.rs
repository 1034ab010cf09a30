//! World state store: rooms, monsters, items, online characters and the
//! combat sessions binding them.
//!
//! Every mutation is synchronous. Invariants enforced here:
//! - every exit points at an existing room (checked at load),
//! - a character or monster is in at most one combat session,
//! - no combat session exists inside a safe zone.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::character::{Character, Equipment};
use super::combat::CombatSession;
use super::{CharacterId, ItemId, MonsterId, RoomId};
use crate::store::records::{RoomItemRecord, RoomRecord, WorldFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Up,
        Direction::Down,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Accepts full names and single-letter abbreviations
    pub fn parse(word: &str) -> Option<Direction> {
        let word = word.trim().to_ascii_lowercase();
        Direction::ALL
            .into_iter()
            .find(|dir| dir.name() == word || dir.name()[..1] == word)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Weapon {
        damage: i32,
    },
    Armor {
        defense: i32,
    },
    Potion {
        #[serde(default)]
        health: i32,
        #[serde(default)]
        mana: i32,
    },
    Misc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ItemKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub level: u32,
    pub max_health: i32,
    pub attack: i32,
    pub defense: i32,
    pub experience: u32,
    /// Item template keys dropped on death
    #[serde(default)]
    pub loot: Vec<String>,
    /// Engages characters entering or standing in its room
    #[serde(default)]
    pub aggressive: bool,
    #[serde(default)]
    pub wanders: bool,
}

fn one() -> usize {
    1
}

/// Repopulation target for a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub monster: String,
    #[serde(default = "one")]
    pub max: usize,
}

/// A live monster
#[derive(Debug, Clone)]
pub struct MonsterInstance {
    pub id: MonsterId,
    pub template: String,
    pub name: String,
    pub health: i32,
    pub room: RoomId,
    pub home: RoomId,
    /// Tick at which a temporary spawn fades away
    pub expires_at: Option<u64>,
    pub engaged_with: Option<CharacterId>,
}

/// An item lying in a room
#[derive(Debug, Clone)]
pub struct ItemInstance {
    pub id: ItemId,
    pub template: String,
    pub hidden: bool,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub exits: BTreeMap<Direction, RoomId>,
    pub safe_zone: bool,
    pub monsters: BTreeSet<MonsterId>,
    pub items: Vec<ItemId>,
    pub spawns: Vec<SpawnPoint>,
}

/// The authoritative in-memory world
#[derive(Debug, Default)]
pub struct World {
    rooms: BTreeMap<RoomId, Room>,
    monster_templates: BTreeMap<String, MonsterTemplate>,
    item_templates: BTreeMap<String, ItemTemplate>,
    monsters: BTreeMap<MonsterId, MonsterInstance>,
    items: HashMap<ItemId, ItemInstance>,
    characters: HashMap<CharacterId, Character>,
    combats: BTreeMap<CharacterId, CombatSession>,
    next_monster: u64,
    next_item: u64,
}

impl World {
    /// Build the world from its stored form, validating every reference
    pub fn from_file(file: WorldFile) -> Result<Self, WorldError> {
        if file.rooms.is_empty() {
            return Err(WorldError::Empty);
        }

        let mut world = World::default();
        for template in file.items {
            world.item_templates.insert(template.key.clone(), template);
        }
        for template in file.monsters {
            if let Some(missing) = template
                .loot
                .iter()
                .find(|key| !world.item_templates.contains_key(*key))
            {
                return Err(WorldError::UnknownItemTemplate(missing.clone()));
            }
            world.monster_templates.insert(template.key.clone(), template);
        }

        let mut placed_items = Vec::new();
        for record in file.rooms {
            if world.rooms.contains_key(&record.id) {
                return Err(WorldError::DuplicateRoom(record.id));
            }

            let mut exits = BTreeMap::new();
            for (word, target) in record.exits {
                let direction = Direction::parse(&word).ok_or_else(|| WorldError::UnknownDirection {
                    room: record.id,
                    direction: word.clone(),
                })?;
                exits.insert(direction, target);
            }

            if let Some(spawn) = record
                .spawns
                .iter()
                .find(|spawn| !world.monster_templates.contains_key(&spawn.monster))
            {
                return Err(WorldError::UnknownMonsterTemplate(spawn.monster.clone()));
            }

            placed_items.push((record.id, record.items));
            world.rooms.insert(
                record.id,
                Room {
                    id: record.id,
                    name: record.name,
                    description: record.description,
                    exits,
                    safe_zone: record.safe_zone,
                    monsters: BTreeSet::new(),
                    items: Vec::new(),
                    spawns: record.spawns,
                },
            );
        }

        for room in world.rooms.values() {
            for (direction, target) in &room.exits {
                if !world.rooms.contains_key(target) {
                    return Err(WorldError::DanglingExit {
                        room: room.id,
                        direction: *direction,
                        target: *target,
                    });
                }
            }
        }

        for (room, items) in placed_items {
            for item in items {
                world.spawn_item(room, &item.template, item.hidden)?;
            }
        }

        world.repopulate();
        Ok(world)
    }

    /// Snapshot rooms, room items and templates for saving
    pub fn to_file(&self) -> WorldFile {
        let rooms = self
            .rooms
            .values()
            .map(|room| RoomRecord {
                id: room.id,
                name: room.name.clone(),
                description: room.description.clone(),
                exits: room
                    .exits
                    .iter()
                    .map(|(dir, target)| (dir.name().to_string(), *target))
                    .collect(),
                safe_zone: room.safe_zone,
                spawns: room.spawns.clone(),
                items: room
                    .items
                    .iter()
                    .filter_map(|id| self.items.get(id))
                    .map(|item| RoomItemRecord {
                        template: item.template.clone(),
                        hidden: item.hidden,
                    })
                    .collect(),
            })
            .collect();

        WorldFile {
            rooms,
            monsters: self.monster_templates.values().cloned().collect(),
            items: self.item_templates.values().cloned().collect(),
        }
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_name(&self, id: RoomId) -> &str {
        self.rooms
            .get(&id)
            .map(|room| room.name.as_str())
            .unwrap_or("Nowhere")
    }

    pub fn safe_zone(&self, id: RoomId) -> bool {
        self.rooms.get(&id).map(|room| room.safe_zone).unwrap_or(false)
    }

    pub fn exit(&self, room: RoomId, direction: Direction) -> Option<RoomId> {
        self.rooms.get(&room)?.exits.get(&direction).copied()
    }

    /// Comma separated exit names, or "none"
    pub fn exit_names(&self, room: RoomId) -> String {
        let names: Vec<&str> = self
            .rooms
            .get(&room)
            .map(|room| room.exits.keys().map(|dir| dir.name()).collect())
            .unwrap_or_default();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    }

    /// Shortest number of exits between two rooms
    pub fn distance(&self, from: RoomId, to: RoomId) -> Option<usize> {
        if from == to {
            return self.rooms.contains_key(&from).then_some(0);
        }
        let mut seen = BTreeSet::from([from]);
        let mut queue = VecDeque::from([(from, 0usize)]);
        while let Some((room, depth)) = queue.pop_front() {
            for next in self.rooms.get(&room).into_iter().flat_map(|r| r.exits.values()) {
                if *next == to {
                    return Some(depth + 1);
                }
                if seen.insert(*next) {
                    queue.push_back((*next, depth + 1));
                }
            }
        }
        None
    }

    /// First step of a shortest path from `from` towards `to`
    pub fn next_hop(&self, from: RoomId, to: RoomId) -> Option<(Direction, RoomId)> {
        if from == to {
            return None;
        }
        let start = self.rooms.get(&from)?;
        let mut seen = BTreeSet::from([from]);
        let mut queue = VecDeque::new();
        for (direction, next) in &start.exits {
            if seen.insert(*next) {
                queue.push_back((*next, (*direction, *next)));
            }
        }
        while let Some((room, first)) = queue.pop_front() {
            if room == to {
                return Some(first);
            }
            for next in self.rooms.get(&room).into_iter().flat_map(|r| r.exits.values()) {
                if seen.insert(*next) {
                    queue.push_back((*next, first));
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Characters
    // ------------------------------------------------------------------

    /// Bring a character online in its current room
    pub fn insert_character(&mut self, character: Character) -> Result<(), WorldError> {
        if !self.rooms.contains_key(&character.room) {
            return Err(WorldError::UnknownRoom(character.room));
        }
        self.characters.insert(character.id, character);
        Ok(())
    }

    /// Take a character offline, ending any combat it is in
    pub fn remove_character(&mut self, id: CharacterId) -> Option<Character> {
        self.end_combat(id);
        self.characters.remove(&id)
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn characters_mut(&mut self) -> impl Iterator<Item = &mut Character> {
        self.characters.values_mut()
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Online characters in a room, ordered by name
    pub fn characters_in_room(&self, room: RoomId) -> Vec<CharacterId> {
        let mut here: Vec<&Character> = self
            .characters
            .values()
            .filter(|c| c.room == room)
            .collect();
        here.sort_by(|a, b| a.name.cmp(&b.name));
        here.into_iter().map(|c| c.id).collect()
    }

    pub fn find_character(&self, name: &str) -> Option<CharacterId> {
        self.characters
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
            .map(|c| c.id)
    }

    /// Move a character, returns the room it left
    pub fn move_character(&mut self, id: CharacterId, to: RoomId) -> Result<RoomId, WorldError> {
        if !self.rooms.contains_key(&to) {
            return Err(WorldError::UnknownRoom(to));
        }
        let character = self
            .characters
            .get_mut(&id)
            .ok_or(WorldError::UnknownCharacter(id))?;
        Ok(std::mem::replace(&mut character.room, to))
    }

    // ------------------------------------------------------------------
    // Monsters
    // ------------------------------------------------------------------

    pub fn monster_template(&self, key: &str) -> Option<&MonsterTemplate> {
        self.monster_templates.get(key)
    }

    pub fn monster_templates(&self) -> impl Iterator<Item = &MonsterTemplate> {
        self.monster_templates.values()
    }

    /// Template of a live monster
    pub fn template_of(&self, id: MonsterId) -> Option<&MonsterTemplate> {
        self.monsters
            .get(&id)
            .and_then(|monster| self.monster_templates.get(&monster.template))
    }

    pub fn monster(&self, id: MonsterId) -> Option<&MonsterInstance> {
        self.monsters.get(&id)
    }

    pub fn monster_mut(&mut self, id: MonsterId) -> Option<&mut MonsterInstance> {
        self.monsters.get_mut(&id)
    }

    pub fn monsters(&self) -> impl Iterator<Item = &MonsterInstance> {
        self.monsters.values()
    }

    pub fn monster_ids(&self) -> Vec<MonsterId> {
        self.monsters.keys().copied().collect()
    }

    pub fn monster_count(&self) -> usize {
        self.monsters.len()
    }

    pub fn monsters_in_room(&self, room: RoomId) -> Vec<MonsterId> {
        self.rooms
            .get(&room)
            .map(|room| room.monsters.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Create a monster at full health; `room` becomes its home
    pub fn spawn_monster(
        &mut self,
        template: &str,
        room: RoomId,
        expires_at: Option<u64>,
    ) -> Result<MonsterId, WorldError> {
        let template = self
            .monster_templates
            .get(template)
            .ok_or_else(|| WorldError::UnknownMonsterTemplate(template.to_string()))?;
        let target = self.rooms.get_mut(&room).ok_or(WorldError::UnknownRoom(room))?;

        self.next_monster += 1;
        let id = MonsterId(self.next_monster);
        target.monsters.insert(id);
        self.monsters.insert(
            id,
            MonsterInstance {
                id,
                template: template.key.clone(),
                name: template.name.clone(),
                health: template.max_health,
                room,
                home: room,
                expires_at,
                engaged_with: None,
            },
        );
        Ok(id)
    }

    /// Remove a monster from the world, ending any combat it is in
    pub fn despawn_monster(&mut self, id: MonsterId) -> Option<MonsterInstance> {
        let monster = self.monsters.remove(&id)?;
        if let Some(character) = monster.engaged_with {
            self.combats.remove(&character);
        }
        if let Some(room) = self.rooms.get_mut(&monster.room) {
            room.monsters.remove(&id);
        }
        Some(monster)
    }

    /// Move a monster, returns the room it left
    pub fn move_monster(&mut self, id: MonsterId, to: RoomId) -> Result<RoomId, WorldError> {
        if !self.rooms.contains_key(&to) {
            return Err(WorldError::UnknownRoom(to));
        }
        let monster = self
            .monsters
            .get_mut(&id)
            .ok_or(WorldError::UnknownMonster(id))?;
        let from = std::mem::replace(&mut monster.room, to);
        if let Some(room) = self.rooms.get_mut(&from) {
            room.monsters.remove(&id);
        }
        if let Some(room) = self.rooms.get_mut(&to) {
            room.monsters.insert(id);
        }
        Ok(from)
    }

    /// Find a monster in a room by name: exact match first, then prefix
    pub fn find_monster(&self, room: RoomId, name: &str) -> Option<MonsterId> {
        let wanted = name.trim().to_ascii_lowercase();
        if wanted.is_empty() {
            return None;
        }
        let here = self.rooms.get(&room)?;
        let candidates = || {
            here.monsters
                .iter()
                .filter_map(|id| self.monsters.get(id))
        };
        candidates()
            .find(|m| m.name.to_ascii_lowercase() == wanted || m.template == wanted)
            .or_else(|| {
                candidates().find(|m| {
                    let lower = m.name.to_ascii_lowercase();
                    lower.starts_with(&wanted)
                        || lower.split_whitespace().any(|word| word.starts_with(&wanted))
                })
            })
            .map(|m| m.id)
    }

    /// Top every spawn point back up, returns the monsters created
    pub fn repopulate(&mut self) -> Vec<MonsterId> {
        let mut wanted = Vec::new();
        for room in self.rooms.values() {
            for spawn in &room.spawns {
                let living = self
                    .monsters
                    .values()
                    .filter(|m| {
                        m.home == room.id && m.template == spawn.monster && m.expires_at.is_none()
                    })
                    .count();
                for _ in living..spawn.max {
                    wanted.push((spawn.monster.clone(), room.id));
                }
            }
        }

        wanted
            .into_iter()
            .filter_map(|(template, room)| self.spawn_monster(&template, room, None).ok())
            .collect()
    }

    /// Unengaged temporary spawns whose time is up
    pub fn expired_monsters(&self, tick: u64) -> Vec<MonsterId> {
        self.monsters
            .values()
            .filter(|m| m.engaged_with.is_none() && m.expires_at.is_some_and(|at| at <= tick))
            .map(|m| m.id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    pub fn item_template(&self, key: &str) -> Option<&ItemTemplate> {
        self.item_templates.get(key)
    }

    pub fn item_templates(&self) -> impl Iterator<Item = &ItemTemplate> {
        self.item_templates.values()
    }

    /// Display name of an item template, falling back to the key
    pub fn item_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.item_templates
            .get(key)
            .map(|t| t.name.as_str())
            .unwrap_or(key)
    }

    pub fn spawn_item(&mut self, room: RoomId, template: &str, hidden: bool) -> Result<ItemId, WorldError> {
        if !self.item_templates.contains_key(template) {
            return Err(WorldError::UnknownItemTemplate(template.to_string()));
        }
        let target = self.rooms.get_mut(&room).ok_or(WorldError::UnknownRoom(room))?;

        self.next_item += 1;
        let id = ItemId(self.next_item);
        target.items.push(id);
        self.items.insert(
            id,
            ItemInstance {
                id,
                template: template.to_string(),
                hidden,
            },
        );
        Ok(id)
    }

    /// Names of the items a character can see in a room
    pub fn visible_items(&self, room: RoomId) -> Vec<&str> {
        self.rooms
            .get(&room)
            .map(|room| {
                room.items
                    .iter()
                    .filter_map(|id| self.items.get(id))
                    .filter(|item| !item.hidden)
                    .map(|item| self.item_name(&item.template))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_hidden_items(&self, room: RoomId) -> bool {
        self.rooms
            .get(&room)
            .map(|room| {
                room.items
                    .iter()
                    .filter_map(|id| self.items.get(id))
                    .any(|item| item.hidden)
            })
            .unwrap_or(false)
    }

    /// Make every hidden item in a room visible, returns their names
    pub fn reveal_hidden_items(&mut self, room: RoomId) -> Vec<String> {
        let Some(room) = self.rooms.get(&room) else {
            return Vec::new();
        };
        let mut revealed = Vec::new();
        for id in &room.items {
            if let Some(item) = self.items.get_mut(id) {
                if item.hidden {
                    item.hidden = false;
                    revealed.push(item.template.clone());
                }
            }
        }
        revealed
            .into_iter()
            .map(|key| self.item_name(&key).to_string())
            .collect()
    }

    /// Pick up a visible item by name, returns its template key
    pub fn take_item(&mut self, room: RoomId, name: &str) -> Option<String> {
        let keys: Vec<String> = self
            .rooms
            .get(&room)?
            .items
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|item| !item.hidden)
            .map(|item| item.template.clone())
            .collect();
        let key = self.match_item(&keys, name)?;

        let target = self.rooms.get_mut(&room)?;
        let index = target.items.iter().position(|id| {
            self.items
                .get(id)
                .is_some_and(|item| !item.hidden && item.template == key)
        })?;
        let id = target.items.remove(index);
        self.items.remove(&id).map(|item| item.template)
    }

    /// Resolve a player-typed item name against a list of template keys
    pub fn match_item(&self, keys: &[String], name: &str) -> Option<String> {
        let wanted = name.trim().to_ascii_lowercase();
        if wanted.is_empty() {
            return None;
        }
        keys.iter()
            .find(|key| {
                key.as_str() == wanted || self.item_name(key).to_ascii_lowercase() == wanted
            })
            .or_else(|| {
                keys.iter().find(|key| {
                    let lower = self.item_name(key).to_ascii_lowercase();
                    lower.starts_with(&wanted)
                        || lower.split_whitespace().any(|word| word.starts_with(&wanted))
                })
            })
            .cloned()
    }

    pub fn weapon_bonus(&self, equipment: &Equipment) -> i32 {
        match equipment
            .weapon
            .as_deref()
            .and_then(|key| self.item_templates.get(key))
            .map(|t| &t.kind)
        {
            Some(ItemKind::Weapon { damage }) => *damage,
            _ => 0,
        }
    }

    pub fn armor_bonus(&self, equipment: &Equipment) -> i32 {
        match equipment
            .armor
            .as_deref()
            .and_then(|key| self.item_templates.get(key))
            .map(|t| &t.kind)
        {
            Some(ItemKind::Armor { defense }) => *defense,
            _ => 0,
        }
    }

    // ------------------------------------------------------------------
    // Combat sessions
    // ------------------------------------------------------------------

    pub fn combat(&self, character: CharacterId) -> Option<&CombatSession> {
        self.combats.get(&character)
    }

    pub fn combat_mut(&mut self, character: CharacterId) -> Option<&mut CombatSession> {
        self.combats.get_mut(&character)
    }

    /// Characters currently in combat, in stable order
    pub fn combat_ids(&self) -> Vec<CharacterId> {
        self.combats.keys().copied().collect()
    }

    pub fn combat_count(&self) -> usize {
        self.combats.len()
    }

    /// Register a new combat session after checking every engagement rule
    pub fn begin_combat(&mut self, session: CombatSession) -> Result<(), WorldError> {
        let character = self
            .characters
            .get(&session.character)
            .ok_or(WorldError::UnknownCharacter(session.character))?;
        let monster = self
            .monsters
            .get(&session.monster)
            .ok_or(WorldError::UnknownMonster(session.monster))?;

        if character.room != monster.room || session.room != character.room {
            return Err(WorldError::NotInSameRoom);
        }
        if self.safe_zone(session.room) {
            return Err(WorldError::SafeZone(session.room));
        }
        if self.combats.contains_key(&session.character) {
            return Err(WorldError::AlreadyInCombat(session.character));
        }
        if monster.engaged_with.is_some() {
            return Err(WorldError::MonsterEngaged(session.monster));
        }

        if let Some(monster) = self.monsters.get_mut(&session.monster) {
            monster.engaged_with = Some(session.character);
        }
        self.combats.insert(session.character, session);
        Ok(())
    }

    /// Destroy a character's combat session, releasing the monster
    pub fn end_combat(&mut self, character: CharacterId) -> Option<CombatSession> {
        let session = self.combats.remove(&character)?;
        if let Some(monster) = self.monsters.get_mut(&session.monster) {
            monster.engaged_with = None;
        }
        Some(session)
    }
}

/// World errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("World has no rooms")]
    Empty,

    #[error("Room {0} is defined twice")]
    DuplicateRoom(RoomId),

    #[error("Room {room} has an exit in unknown direction '{direction}'")]
    UnknownDirection { room: RoomId, direction: String },

    #[error("Room {room} exit {direction} leads to missing room {target}")]
    DanglingExit {
        room: RoomId,
        direction: Direction,
        target: RoomId,
    },

    #[error("Unknown room {0}")]
    UnknownRoom(RoomId),

    #[error("Unknown monster template '{0}'")]
    UnknownMonsterTemplate(String),

    #[error("Unknown item template '{0}'")]
    UnknownItemTemplate(String),

    #[error("Character {0} is not online")]
    UnknownCharacter(CharacterId),

    #[error("Monster {0} does not exist")]
    UnknownMonster(MonsterId),

    #[error("Room {0} is a safe zone")]
    SafeZone(RoomId),

    #[error("Character {0} is already fighting")]
    AlreadyInCombat(CharacterId),

    #[error("Monster {0} is already engaged")]
    MonsterEngaged(MonsterId),

    #[error("Combatants are not in the same room")]
    NotInSameRoom,
}
