//! Engine side of combat: builds combatants from the world, runs the pure
//! transition and applies its consequences.

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::Engine;
use crate::game::combat::{
    step, CombatAction, CombatEffect, CombatSession, CombatStatus, Combatant, Transition, Turn,
};
use crate::game::command::CommandError;
use crate::game::{CharacterId, Direction, MonsterId, RoomId};
use crate::session::SessionId;

impl Engine {
    /// `attack <target>`: open a session and resolve the opening blow
    pub(super) fn start_combat(
        &mut self,
        session_id: SessionId,
        id: CharacterId,
        target: &str,
    ) -> Result<(), CommandError> {
        let character = self
            .world
            .character(id)
            .ok_or_else(|| CommandError::validation("You are not in the world."))?;
        let (name, room) = (character.name.clone(), character.room);

        if self.world.safe_zone(room) {
            return Err(CommandError::zone("You cannot attack in this sacred place!"));
        }
        if let Some(current) = self.world.combat(id) {
            let foe = self
                .world
                .monster(current.monster)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| "enemy".to_string());
            return Err(CommandError::combat_state(format!(
                "You are already fighting the {}!",
                foe
            )));
        }

        let Some(monster) = self.world.find_monster(room, target) else {
            let here: Vec<String> = self
                .world
                .monsters_in_room(room)
                .into_iter()
                .filter_map(|m| self.world.monster(m))
                .map(|m| m.name.clone())
                .collect();
            return Err(CommandError::validation(if here.is_empty() {
                format!("There is no '{}' here.", target)
            } else {
                format!("There is no '{}' here. You see: {}", target, here.join(", "))
            }));
        };
        let monster_name = self.monster_name(monster);
        if let Some(other) = self.world.monster(monster).and_then(|m| m.engaged_with) {
            return Err(CommandError::combat_state(format!(
                "The {} is already fighting {}.",
                monster_name,
                self.character_name(other)
            )));
        }

        self.world
            .begin_combat(CombatSession::new(id, monster, room, self.tick))
            .map_err(|err| CommandError::combat_state(err.to_string()))?;
        info!(character = %name, monster = %monster, room, tick = self.tick, "Combat started");

        self.send(session_id, format!("You attack the {}!", monster_name));
        self.broadcast_room(room, Some(id), &format!("{} attacks the {}!", name, monster_name));
        self.combat_action(id, CombatAction::PlayerAttack)
    }

    pub(super) fn flee(&mut self, id: CharacterId) -> Result<(), CommandError> {
        if self.world.combat(id).is_none() {
            return Err(CommandError::combat_state("You are not fighting anything."));
        }
        self.flee_toward(id, None)
    }

    /// Try to flee; on success leave through `exit` when the room has it,
    /// otherwise through a random exit
    pub(super) fn flee_toward(&mut self, id: CharacterId, exit: Option<Direction>) -> Result<(), CommandError> {
        self.resolve(id, CombatAction::PlayerFlee, exit)
    }

    pub(super) fn combat_action(&mut self, id: CharacterId, action: CombatAction) -> Result<(), CommandError> {
        self.resolve(id, action, None)
    }

    /// Run one action through the transition function and apply the result
    fn resolve(
        &mut self,
        id: CharacterId,
        action: CombatAction,
        exit: Option<Direction>,
    ) -> Result<(), CommandError> {
        let session = self
            .world
            .combat(id)
            .cloned()
            .ok_or_else(|| CommandError::combat_state("You are not fighting anything."))?;
        let (player, monster) = self
            .combatants(&session)
            .ok_or_else(|| CommandError::combat_state("That fight is already over."))?;

        let transition = step(
            &session,
            action,
            &player,
            &monster,
            &self.combat_rules,
            self.tick,
            &mut self.rng,
        )?;
        self.apply_transition(transition, exit);
        Ok(())
    }

    fn combatants(&self, session: &CombatSession) -> Option<(Combatant, Combatant)> {
        let character = self.world.character(session.character)?;
        let monster = self.world.monster(session.monster)?;
        let template = self.world.template_of(session.monster)?;
        let player = Combatant {
            health: character.health,
            attack: character.attributes.strength + self.world.weapon_bonus(&character.equipment),
            defense: character.attributes.constitution / 2
                + self.world.armor_bonus(&character.equipment),
        };
        let foe = Combatant {
            health: monster.health,
            attack: template.attack,
            defense: template.defense,
        };
        Some((player, foe))
    }

    fn monster_name(&self, id: MonsterId) -> String {
        self.world
            .monster(id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "creature".to_string())
    }

    fn apply_transition(&mut self, transition: Transition, exit: Option<Direction>) {
        let Transition {
            session,
            player_health,
            monster_health,
            effects,
        } = transition;
        let id = session.character;
        let room = session.room;
        let name = self.character_name(id);
        let foe = self.monster_name(session.monster);

        if let Some(character) = self.world.character_mut(id) {
            character.set_health(player_health);
        }
        if let Some(monster) = self.world.monster_mut(session.monster) {
            monster.health = monster_health.max(0);
        }

        for effect in &effects {
            match effect {
                CombatEffect::PlayerHit {
                    damage,
                    monster_health,
                } => {
                    self.send_to_character(
                        id,
                        format!(
                            "You hit the {} for {} damage. ({} HP left)",
                            foe, damage, monster_health
                        ),
                    );
                    self.broadcast_room(room, Some(id), &format!("{} hits the {}.", name, foe));
                }
                CombatEffect::MonsterHit { damage, .. } => {
                    self.send_to_character(id, format!("The {} hits you for {} damage!", foe, damage));
                    self.broadcast_room(room, Some(id), &format!("The {} hits {}.", foe, name));
                }
                CombatEffect::FleeFailed => {
                    self.send_to_character(
                        id,
                        format!("You try to flee, but the {} blocks your way!", foe),
                    );
                    self.broadcast_room(room, Some(id), &format!("{} tries to flee but fails.", name));
                }
                CombatEffect::Fled | CombatEffect::Victory | CombatEffect::Defeat => {}
            }
        }
        self.mark_status_dirty(id);

        match session.status {
            CombatStatus::Active => {
                if let Some(current) = self.world.combat_mut(id) {
                    *current = session;
                }
            }
            CombatStatus::PlayerVictory => self.on_victory(id, session.monster, room),
            CombatStatus::PlayerDefeat => self.on_defeat(id, &foe, room),
            CombatStatus::Fled => self.on_fled(id, &foe, room, exit),
        }
    }

    fn on_victory(&mut self, id: CharacterId, monster: MonsterId, room: RoomId) {
        let name = self.character_name(id);
        let (experience, loot) = self
            .world
            .template_of(monster)
            .map(|t| (t.experience, t.loot.clone()))
            .unwrap_or_default();
        self.world.end_combat(id);
        let Some(slain) = self.world.despawn_monster(monster) else {
            return;
        };
        info!(character = %name, monster = %slain.name, experience, tick = self.tick, "Combat won");

        self.send_to_character(
            id,
            format!("You have slain the {}! You gain {} experience.", slain.name, experience),
        );
        self.broadcast_room(room, Some(id), &format!("{} has slain the {}!", name, slain.name));

        let levels = self
            .world
            .character_mut(id)
            .map(|c| c.gain_experience(experience))
            .unwrap_or_default();
        for level in levels {
            info!(character = %name, level, "Level up");
            self.send_to_character(id, format!("Congratulations! You reached level {}!", level));
            self.broadcast_room(room, Some(id), &format!("{} has reached level {}!", name, level));
        }

        for key in loot {
            match self.world.spawn_item(room, &key, false) {
                Ok(_) => {
                    let item = self.world.item_name(&key).to_string();
                    self.broadcast_room(room, None, &format!("The {} dropped a {}.", slain.name, item));
                }
                Err(err) => warn!(error = %err, "Loot drop failed"),
            }
        }
        self.save_character(id);
    }

    fn on_defeat(&mut self, id: CharacterId, foe: &str, room: RoomId) {
        self.world.end_combat(id);
        let respawn = self.rules.respawn_room;
        let name = self.character_name(id);
        if let Some(character) = self.world.character_mut(id) {
            character.respawn(respawn);
        }
        info!(character = %name, monster = %foe, respawn, tick = self.tick, "Combat lost");

        self.send_to_character(id, "You have died!");
        self.broadcast_room(room, Some(id), &format!("{} has been slain by the {}!", name, foe));
        self.send_to_character(id, "You awaken in a holy place, weakened but alive.");
        let description = self.describe_room(id);
        self.send_to_character(id, description);
        self.broadcast_room(respawn, Some(id), &format!("{} appears, looking pale.", name));
        self.save_character(id);
    }

    /// A successful flee ends the fight and carries the character out
    /// through the chosen exit, or a random one if the room has any
    fn on_fled(&mut self, id: CharacterId, foe: &str, room: RoomId, exit: Option<Direction>) {
        self.world.end_combat(id);
        let name = self.character_name(id);
        debug!(character = %name, monster = %foe, "Fled from combat");
        self.send_to_character(id, format!("You flee from the {}!", foe));

        let chosen = exit.and_then(|dir| self.world.exit(room, dir).map(|to| (dir, to)));
        let exits: Vec<_> = match chosen {
            Some(chosen) => vec![chosen],
            None => self
                .world
                .room(room)
                .map(|r| r.exits.iter().map(|(dir, to)| (*dir, *to)).collect())
                .unwrap_or_default(),
        };
        let Some((direction, to)) = exits.choose(&mut self.rng).copied() else {
            self.broadcast_room(room, Some(id), &format!("{} flees from the {}!", name, foe));
            return;
        };
        if let Some(session_id) = self.sessions.session_for_character(id) {
            if let Err(err) = self.relocate(
                session_id,
                id,
                to,
                &format!("{} flees {}!", name, direction),
                &format!("{} arrives, out of breath.", name),
            ) {
                warn!(error = %err, "Flee relocation failed");
            }
        }
    }

    /// The character vanished mid-fight; resolve as a flee without moving
    pub(super) fn abandon_combat(&mut self, id: CharacterId) {
        let Some(session) = self.world.combat(id).cloned() else {
            return;
        };
        let outcome = self.combatants(&session).map(|(player, monster)| {
            step(
                &session,
                CombatAction::Abandon,
                &player,
                &monster,
                &self.combat_rules,
                self.tick,
                &mut self.rng,
            )
        });
        if !matches!(outcome, Some(Ok(ref t)) if t.session.status == CombatStatus::Fled) {
            warn!(character = %id, "Abandoned combat did not resolve cleanly");
        }
        self.world.end_combat(id);

        let name = self.character_name(id);
        let foe = self.monster_name(session.monster);
        info!(character = %name, monster = %foe, "Combat abandoned");
        self.broadcast_room(session.room, Some(id), &format!("{} has fled from the {}!", name, foe));
    }

    /// Per-tick combat: monsters strike on their turn, idle players
    /// auto-attack once their turn has waited long enough
    pub(super) fn advance_combats(&mut self) {
        for id in self.world.combat_ids() {
            let Some(session) = self.world.combat(id) else {
                continue;
            };
            let action = match session.turn {
                Turn::Monster => CombatAction::MonsterAttack,
                Turn::Player
                    if self.tick.saturating_sub(session.turn_started_tick)
                        >= self.rules.auto_attack_delay =>
                {
                    CombatAction::PlayerAttack
                }
                Turn::Player => continue,
            };
            if let Err(err) = self.combat_action(id, action) {
                warn!(character = %id, error = %err, "Combat step failed, ending session");
                self.world.end_combat(id);
            }
        }
    }
}
