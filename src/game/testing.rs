//! Shared fixtures for unit and scenario tests

use std::collections::BTreeMap;

use uuid::Uuid;

use super::character::{Attributes, Character, Class, Race};
use super::world::{ItemKind, ItemTemplate, MonsterTemplate, SpawnPoint, World};
use super::RoomId;
use crate::store::records::{RoomItemRecord, RoomRecord, WorldFile};

fn room(id: RoomId, name: &str, safe_zone: bool, exits: &[(&str, RoomId)]) -> RoomRecord {
    RoomRecord {
        id,
        name: name.to_string(),
        description: format!("You are in the {}.", name.to_lowercase()),
        exits: exits
            .iter()
            .map(|(dir, to)| (dir.to_string(), *to))
            .collect::<BTreeMap<_, _>>(),
        safe_zone,
        spawns: Vec::new(),
        items: Vec::new(),
    }
}

fn item(key: &str, name: &str, kind: ItemKind) -> ItemTemplate {
    ItemTemplate {
        key: key.to_string(),
        name: name.to_string(),
        description: String::new(),
        kind,
    }
}

/// Five rooms:
/// 1 Town Square (safe) - 2 Temple of Healing (safe, north of 1)
/// 3 Forest Path (goblin) south of 1, 4 Dark Woods (wolf) south of 3,
/// 5 Clearing east of 3 with a potion and a hidden ring.
pub(crate) fn sample_world_file() -> WorldFile {
    let mut forest = room(3, "Forest Path", false, &[("north", 1), ("south", 4), ("east", 5)]);
    forest.spawns.push(SpawnPoint {
        monster: "goblin".to_string(),
        max: 1,
    });

    let mut woods = room(4, "Dark Woods", false, &[("north", 3)]);
    woods.spawns.push(SpawnPoint {
        monster: "wolf".to_string(),
        max: 1,
    });

    let mut clearing = room(5, "Clearing", false, &[("west", 3)]);
    clearing.items = vec![
        RoomItemRecord {
            template: "health_potion".to_string(),
            hidden: false,
        },
        RoomItemRecord {
            template: "silver_ring".to_string(),
            hidden: true,
        },
    ];

    WorldFile {
        rooms: vec![
            room(1, "Town Square", true, &[("north", 2), ("south", 3)]),
            room(2, "Temple of Healing", true, &[("south", 1)]),
            forest,
            woods,
            clearing,
        ],
        monsters: vec![
            MonsterTemplate {
                key: "goblin".to_string(),
                name: "Goblin".to_string(),
                description: "A small green creature.".to_string(),
                level: 1,
                max_health: 10,
                attack: 5,
                defense: 0,
                experience: 15,
                loot: vec!["health_potion".to_string()],
                aggressive: false,
                wanders: false,
            },
            MonsterTemplate {
                key: "wolf".to_string(),
                name: "Grey Wolf".to_string(),
                description: "A hungry wolf.".to_string(),
                level: 2,
                max_health: 20,
                attack: 6,
                defense: 1,
                experience: 25,
                loot: Vec::new(),
                aggressive: true,
                wanders: true,
            },
        ],
        items: vec![
            item("health_potion", "Health Potion", ItemKind::Potion { health: 25, mana: 0 }),
            item("mana_potion", "Mana Potion", ItemKind::Potion { health: 0, mana: 20 }),
            item("iron_sword", "Iron Sword", ItemKind::Weapon { damage: 4 }),
            item("leather_armor", "Leather Armor", ItemKind::Armor { defense: 2 }),
            item("silver_ring", "Silver Ring", ItemKind::Misc),
        ],
    }
}

pub(crate) fn sample_world() -> World {
    match World::from_file(sample_world_file()) {
        Ok(world) => world,
        Err(err) => panic!("sample world is invalid: {}", err),
    }
}

/// A plain human warrior with every attribute at 10 before bonuses
pub(crate) fn sample_character(name: &str, room: RoomId) -> Character {
    Character::create(
        Uuid::new_v4(),
        name.to_ascii_lowercase(),
        name.to_string(),
        Race::Human,
        Class::Warrior,
        Attributes {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        },
        room,
    )
}
