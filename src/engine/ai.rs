//! Periodic world upkeep: monster lifecycle, aggression, wandering and
//! passive regeneration.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::Engine;
use crate::game::combat::CombatSession;
use crate::game::{CharacterId, Direction, MonsterId, RoomId};

/// Odds that a wandering monster actually moves on a wander tick
const WANDER_CHANCE: f64 = 0.5;

impl Engine {
    /// Temporary spawns whose lifetime is up fade away
    pub(super) fn expire_monsters(&mut self) {
        for id in self.world.expired_monsters(self.tick) {
            if let Some(monster) = self.world.despawn_monster(id) {
                debug!(monster = %id, name = %monster.name, "Temporary spawn expired");
                self.broadcast_room(monster.room, None, &format!("The {} fades away.", monster.name));
            }
        }
    }

    pub(super) fn repopulate(&mut self) {
        if self.tick % self.rules.repop_every != 0 {
            return;
        }
        let spawned = self.world.repopulate();
        if spawned.is_empty() {
            return;
        }
        info!(tick = self.tick, count = spawned.len(), "Repopulated spawn points");
        for id in spawned {
            if let Some((room, name)) = self.world.monster(id).map(|m| (m.room, m.name.clone())) {
                self.broadcast_room(room, None, &format!("A {} appears.", name));
            }
        }
    }

    /// Aggressive, unengaged monsters ambush the first idle character in
    /// their room; the monster strikes first
    pub(super) fn monster_aggression(&mut self) {
        let mut claimed: HashSet<CharacterId> = HashSet::new();
        let mut ambushes: Vec<(CharacterId, MonsterId, RoomId)> = Vec::new();

        for monster in self.world.monsters() {
            if monster.engaged_with.is_some() || self.world.safe_zone(monster.room) {
                continue;
            }
            let aggressive = self
                .world
                .monster_template(&monster.template)
                .is_some_and(|t| t.aggressive);
            if !aggressive {
                continue;
            }
            let victim = self
                .world
                .characters_in_room(monster.room)
                .into_iter()
                .find(|c| self.world.combat(*c).is_none() && !claimed.contains(c));
            if let Some(victim) = victim {
                claimed.insert(victim);
                ambushes.push((victim, monster.id, monster.room));
            }
        }

        for (victim, monster, room) in ambushes {
            let session = CombatSession::ambush(victim, monster, room, self.tick);
            if self.world.begin_combat(session).is_err() {
                continue;
            }
            let name = self.character_name(victim);
            let foe = self
                .world
                .monster(monster)
                .map(|m| m.name.clone())
                .unwrap_or_default();
            if let Some(character) = self.world.character_mut(victim) {
                character.resting = false;
            }
            info!(character = %name, monster = %foe, room, tick = self.tick, "Monster ambush");
            self.send_to_character(victim, format!("The {} attacks you!", foe));
            self.broadcast_room(room, Some(victim), &format!("The {} attacks {}!", foe, name));
        }
    }

    /// Unengaged monsters drift around their home, and anything beyond the
    /// leash radius heads back
    pub(super) fn wander_monsters(&mut self) {
        if self.tick % self.rules.wander_every != 0 {
            return;
        }
        let radius = self.rules.leash_radius;

        for id in self.world.monster_ids() {
            let Some(monster) = self.world.monster(id) else {
                continue;
            };
            if monster.engaged_with.is_some() {
                continue;
            }
            let (room, home, name) = (monster.room, monster.home, monster.name.clone());
            let wanders = self
                .world
                .monster_template(&monster.template)
                .is_some_and(|t| t.wanders);

            let leashed = self
                .world
                .distance(room, home)
                .map_or(true, |d| d > radius);
            let step: Option<(Direction, RoomId)> = if leashed {
                self.world.next_hop(room, home)
            } else if wanders && self.rng.gen_bool(WANDER_CHANCE) {
                let choices: Vec<(Direction, RoomId)> = self
                    .world
                    .room(room)
                    .map(|r| {
                        r.exits
                            .iter()
                            .map(|(dir, to)| (*dir, *to))
                            .filter(|(_, to)| !self.world.safe_zone(*to))
                            .filter(|(_, to)| self.world.distance(*to, home).is_some_and(|d| d <= radius))
                            .collect()
                    })
                    .unwrap_or_default();
                choices.choose(&mut self.rng).copied()
            } else {
                None
            };

            let Some((direction, to)) = step else {
                continue;
            };
            if self.world.move_monster(id, to).is_ok() {
                debug!(monster = %id, from = room, to, leashed, "Monster moved");
                self.broadcast_room(room, None, &format!("The {} wanders {}.", name, direction));
                self.broadcast_room(to, None, &format!("A {} wanders in.", name));
            }
        }
    }

    /// Resting characters out of combat recover a tenth of their maximums
    pub(super) fn regenerate(&mut self) {
        if self.tick % self.rules.regen_every != 0 {
            return;
        }
        let fighting: HashSet<CharacterId> = self.world.combat_ids().into_iter().collect();
        let mut changed = Vec::new();
        let mut rested = Vec::new();

        for character in self.world.characters_mut() {
            if !character.resting || fighting.contains(&character.id) {
                continue;
            }
            let health = character.heal((character.max_health / 10).max(1));
            let mana = character.restore_mana((character.max_mana / 10).max(1));
            if health > 0 || mana > 0 {
                changed.push(character.id);
            }
            if character.fully_rested() {
                character.resting = false;
                rested.push(character.id);
            }
        }

        for id in changed {
            self.mark_status_dirty(id);
        }
        for id in rested {
            self.send_to_character(id, "You feel fully rested.");
        }
    }
}
