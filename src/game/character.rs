//! Player characters: attributes, race and class, vitals, cooldowns

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::status::DEFAULT_STATUS_TEMPLATE;
use super::{CharacterId, RoomId};

/// Lowest value any attribute may take after bonuses
pub const MIN_ATTRIBUTE: i32 = 3;

/// The six core attributes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Attributes {
    const fn new(str: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    /// Roll every attribute as 4d6, dropping the lowest die
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut roll = || {
            let mut dice = [0i32; 4];
            for die in dice.iter_mut() {
                *die = rng.gen_range(1..=6);
            }
            dice.sort_unstable();
            dice[1..].iter().sum()
        };
        Self::new(roll(), roll(), roll(), roll(), roll(), roll())
    }

    fn plus(self, other: Attributes) -> Self {
        Self::new(
            self.strength + other.strength,
            self.dexterity + other.dexterity,
            self.constitution + other.constitution,
            self.intelligence + other.intelligence,
            self.wisdom + other.wisdom,
            self.charisma + other.charisma,
        )
    }

    fn floored(self, min: i32) -> Self {
        Self::new(
            self.strength.max(min),
            self.dexterity.max(min),
            self.constitution.max(min),
            self.intelligence.max(min),
            self.wisdom.max(min),
            self.charisma.max(min),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Race {
    Human,
    Elf,
    Dwarf,
    Halfling,
    Orc,
}

impl Race {
    pub const ALL: [Race; 5] = [Race::Human, Race::Elf, Race::Dwarf, Race::Halfling, Race::Orc];

    pub fn name(self) -> &'static str {
        match self {
            Race::Human => "Human",
            Race::Elf => "Elf",
            Race::Dwarf => "Dwarf",
            Race::Halfling => "Halfling",
            Race::Orc => "Orc",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Race::Human => "Versatile and adaptable; a little better at everything.",
            Race::Elf => "Graceful and wise, attuned to magic.",
            Race::Dwarf => "Hardy and strong, difficult to bring down.",
            Race::Halfling => "Small, quick and charming.",
            Race::Orc => "Brutally strong and tough.",
        }
    }

    pub fn attribute_bonus(self) -> Attributes {
        match self {
            Race::Human => Attributes::new(1, 1, 1, 1, 1, 1),
            Race::Elf => Attributes::new(0, 2, -1, 2, 1, 0),
            Race::Dwarf => Attributes::new(2, -1, 3, 0, 1, -1),
            Race::Halfling => Attributes::new(-2, 3, -1, 0, 0, 2),
            Race::Orc => Attributes::new(3, 0, 2, -2, 0, -1),
        }
    }

    pub fn health_bonus(self) -> i32 {
        match self {
            Race::Dwarf => 15,
            _ => 0,
        }
    }

    pub fn mana_bonus(self) -> i32 {
        match self {
            Race::Elf => 10,
            _ => 0,
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Race {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Race::ALL
            .into_iter()
            .find(|race| race.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("'{}' is not a race.", s.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    Warrior,
    Mage,
    Rogue,
    Cleric,
    Ranger,
}

impl Class {
    pub const ALL: [Class; 5] = [
        Class::Warrior,
        Class::Mage,
        Class::Rogue,
        Class::Cleric,
        Class::Ranger,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Class::Warrior => "Warrior",
            Class::Mage => "Mage",
            Class::Rogue => "Rogue",
            Class::Cleric => "Cleric",
            Class::Ranger => "Ranger",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Class::Warrior => "A master of arms who stands in the front line.",
            Class::Mage => "A scholar of the arcane, fragile but potent.",
            Class::Rogue => "A nimble opportunist who strikes from the shadows.",
            Class::Cleric => "A devoted healer with a sturdy faith.",
            Class::Ranger => "A wilderness hunter at home in the forest.",
        }
    }

    pub fn attribute_bonus(self) -> Attributes {
        match self {
            Class::Warrior => Attributes::new(3, 0, 2, -1, 0, 0),
            Class::Mage => Attributes::new(-2, 0, 0, 3, 2, 0),
            Class::Rogue => Attributes::new(0, 3, -1, 0, 0, 1),
            Class::Cleric => Attributes::new(0, -1, 1, 0, 3, 0),
            Class::Ranger => Attributes::new(1, 2, 0, 0, 2, 0),
        }
    }

    pub fn health_bonus(self) -> i32 {
        match self {
            Class::Warrior => 20,
            Class::Mage => -10,
            Class::Rogue => 5,
            Class::Cleric => 10,
            Class::Ranger => 15,
        }
    }

    pub fn mana_bonus(self) -> i32 {
        match self {
            Class::Warrior => 0,
            Class::Mage => 30,
            Class::Rogue => 10,
            Class::Cleric => 20,
            Class::Ranger => 15,
        }
    }

    /// Item template keys handed out at creation
    pub fn starting_items(self) -> &'static [&'static str] {
        match self {
            Class::Warrior => &["iron_sword", "leather_armor", "health_potion"],
            Class::Mage => &["wooden_staff", "cloth_robe", "mana_potion"],
            Class::Rogue => &["dagger", "leather_armor", "health_potion"],
            Class::Cleric => &["iron_mace", "cloth_robe", "health_potion"],
            Class::Ranger => &["short_bow", "leather_armor", "health_potion"],
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Class {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Class::ALL
            .into_iter()
            .find(|class| class.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("'{}' is not a class.", s.trim()))
    }
}

/// Actions gated by a per-character cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Move,
    Use,
    Search,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Move => "move",
            ActionKind::Use => "use an item",
            ActionKind::Search => "search",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipSlot {
    Weapon,
    Armor,
}

/// Equipped item template keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub weapon: Option<String>,
    pub armor: Option<String>,
}

impl Equipment {
    pub fn slot(&self, slot: EquipSlot) -> Option<&String> {
        match slot {
            EquipSlot::Weapon => self.weapon.as_ref(),
            EquipSlot::Armor => self.armor.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, slot: EquipSlot) -> &mut Option<String> {
        match slot {
            EquipSlot::Weapon => &mut self.weapon,
            EquipSlot::Armor => &mut self.armor,
        }
    }
}

fn default_status_template() -> String {
    DEFAULT_STATUS_TEMPLATE.to_string()
}

/// A player character (authoritative)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    /// Owning account username
    pub account: String,
    pub name: String,
    pub race: Race,
    pub class: Class,
    pub level: u32,
    pub experience: u32,

    // Vitals
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,

    pub attributes: Attributes,
    pub room: RoomId,

    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub equipment: Equipment,
    #[serde(default = "default_status_template")]
    pub status_template: String,

    /// Action kind -> tick at which the action is allowed again
    #[serde(skip)]
    pub cooldowns: HashMap<ActionKind, u64>,
    #[serde(skip)]
    pub resting: bool,
}

impl Character {
    /// Build a level 1 character from rolled attributes
    pub fn create(
        id: CharacterId,
        account: String,
        name: String,
        race: Race,
        class: Class,
        rolled: Attributes,
        room: RoomId,
    ) -> Self {
        let attributes = rolled
            .plus(race.attribute_bonus())
            .plus(class.attribute_bonus())
            .floored(MIN_ATTRIBUTE);

        let max_health =
            (50 + 2 * attributes.constitution + race.health_bonus() + class.health_bonus()).max(1);
        let max_mana =
            (20 + 2 * attributes.intelligence + race.mana_bonus() + class.mana_bonus()).max(0);

        Self {
            id,
            account,
            name,
            race,
            class,
            level: 1,
            experience: 0,
            health: max_health,
            max_health,
            mana: max_mana,
            max_mana,
            attributes,
            room,
            inventory: Vec::new(),
            equipment: Equipment::default(),
            status_template: default_status_template(),
            cooldowns: HashMap::new(),
            resting: false,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// Set health, clamped to `0..=max_health`
    pub fn set_health(&mut self, health: i32) {
        self.health = health.clamp(0, self.max_health);
    }

    /// Heal up to max health, returns the amount restored
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.health;
        self.set_health(self.health.saturating_add(amount.max(0)));
        self.health - before
    }

    /// Restore mana up to max mana, returns the amount restored
    pub fn restore_mana(&mut self, amount: i32) -> i32 {
        let before = self.mana;
        self.mana = self.mana.saturating_add(amount.max(0)).min(self.max_mana);
        self.mana - before
    }

    pub fn fully_rested(&self) -> bool {
        self.health >= self.max_health && self.mana >= self.max_mana
    }

    /// Add experience, returns the new level for every level gained
    pub fn gain_experience(&mut self, amount: u32) -> Vec<u32> {
        self.experience = self.experience.saturating_add(amount);
        let mut gained = Vec::new();
        while self.experience >= self.level.saturating_mul(100) {
            self.level += 1;
            self.max_health += 10;
            self.health = self.max_health;
            gained.push(self.level);
        }
        gained
    }

    /// Return to `room` with half vitals after a defeat
    pub fn respawn(&mut self, room: RoomId) {
        self.room = room;
        self.health = (self.max_health / 2).max(1);
        self.mana = self.max_mana / 2;
        self.resting = false;
    }

    /// Ticks left before `kind` is allowed again, if any
    pub fn cooldown_remaining(&self, kind: ActionKind, tick: u64) -> Option<u64> {
        self.cooldowns
            .get(&kind)
            .filter(|ready_at| **ready_at > tick)
            .map(|ready_at| ready_at - tick)
    }

    pub fn start_cooldown(&mut self, kind: ActionKind, tick: u64, ticks: u64) {
        if ticks > 0 {
            self.cooldowns.insert(kind, tick + ticks);
        }
    }

    /// Drop every cooldown due at `tick`, returns how many expired
    pub fn expire_cooldowns(&mut self, tick: u64) -> usize {
        let before = self.cooldowns.len();
        self.cooldowns.retain(|_, ready_at| *ready_at > tick);
        before - self.cooldowns.len()
    }

    /// Remove the first inventory entry matching a template key
    pub fn take_from_inventory(&mut self, template: &str) -> Option<String> {
        let index = self.inventory.iter().position(|key| key == template)?;
        Some(self.inventory.remove(index))
    }
}
