//! Stored document shapes for accounts, characters and the world

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::character::Character;
use crate::game::world::{ItemTemplate, MonsterTemplate, SpawnPoint};
use crate::game::{CharacterId, RoomId};

/// Access level granted to the very first account
pub const ADMIN_ACCESS_LEVEL: u8 = 10;
/// Access level of ordinary players
pub const PLAYER_ACCESS_LEVEL: u8 = 1;

/// Login account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub access_level: u8,
    #[serde(default)]
    pub character_id: Option<CharacterId>,
    pub created_at: DateTime<Utc>,
}

/// Character row / document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterRecord {
    #[serde(flatten)]
    pub character: Character,
    pub updated_at: DateTime<Utc>,
}

impl CharacterRecord {
    pub fn snapshot(character: &Character) -> Self {
        Self {
            character: character.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// An item placed in a room at load time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomItemRecord {
    pub template: String,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Direction name -> target room
    #[serde(default)]
    pub exits: BTreeMap<String, RoomId>,
    #[serde(default)]
    pub safe_zone: bool,
    #[serde(default)]
    pub spawns: Vec<SpawnPoint>,
    #[serde(default)]
    pub items: Vec<RoomItemRecord>,
}

/// The whole world as stored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldFile {
    pub rooms: Vec<RoomRecord>,
    #[serde(default)]
    pub monsters: Vec<MonsterTemplate>,
    #[serde(default)]
    pub items: Vec<ItemTemplate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::sample_character;

    #[test]
    fn character_record_flattens_character_fields() {
        let hero = sample_character("Hero", 3);
        let record = CharacterRecord::snapshot(&hero);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Hero");
        assert_eq!(json["room"], 3);
        assert!(json.get("updated_at").is_some());
        assert!(json.get("resting").is_none());

        let back: CharacterRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.character.id, hero.id);
    }

    #[test]
    fn sparse_room_documents_parse() {
        let room: RoomRecord =
            serde_json::from_str(r#"{"id": 9, "name": "Cellar", "exits": {"up": 1}}"#).unwrap();
        assert_eq!(room.exits.get("up"), Some(&1));
        assert!(!room.safe_zone);
        assert!(room.spawns.is_empty());
    }
}
