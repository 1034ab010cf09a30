//! Game rules and world model

pub mod character;
pub mod combat;
pub mod command;
pub mod status;
pub mod world;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use uuid::Uuid;

pub use character::Character;
pub use combat::CombatSession;
pub use command::{Action, CommandError, CommandTable};
pub use world::{Direction, World, WorldError};

pub type RoomId = u32;
pub type CharacterId = Uuid;

/// Live monster instance identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonsterId(pub u64);

impl fmt::Display for MonsterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Room item instance identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);
