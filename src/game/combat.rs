//! Turn-based combat between one character and one monster
//!
//! `step` is a pure transition function: it reads the current session and
//! both combatants, rolls dice on the supplied RNG and returns the next
//! session together with the effects the engine must apply and narrate.

use rand::Rng;

use super::{CharacterId, MonsterId, RoomId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Player,
    Monster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatStatus {
    Active,
    PlayerVictory,
    PlayerDefeat,
    Fled,
}

impl CombatStatus {
    pub fn is_terminal(self) -> bool {
        self != CombatStatus::Active
    }
}

/// Ephemeral state binding one character and one monster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatSession {
    pub character: CharacterId,
    pub monster: MonsterId,
    pub room: RoomId,
    pub turn: Turn,
    /// Number of resolved turns
    pub turns: u32,
    pub player_blows: u32,
    pub monster_blows: u32,
    pub status: CombatStatus,
    pub started_tick: u64,
    /// Tick at which the current turn was handed over
    pub turn_started_tick: u64,
}

impl CombatSession {
    /// A fresh session where the character swings first
    pub fn new(character: CharacterId, monster: MonsterId, room: RoomId, tick: u64) -> Self {
        Self {
            character,
            monster,
            room,
            turn: Turn::Player,
            turns: 0,
            player_blows: 0,
            monster_blows: 0,
            status: CombatStatus::Active,
            started_tick: tick,
            turn_started_tick: tick,
        }
    }

    /// A session opened by an aggressive monster, which acts first
    pub fn ambush(character: CharacterId, monster: MonsterId, room: RoomId, tick: u64) -> Self {
        Self {
            turn: Turn::Monster,
            ..Self::new(character, monster, room, tick)
        }
    }
}

/// Combat-relevant numbers for one side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combatant {
    pub health: i32,
    pub attack: i32,
    pub defense: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatAction {
    /// The character strikes (typed `attack` or auto-attack)
    PlayerAttack,
    PlayerFlee,
    MonsterAttack,
    /// The character vanished (disconnect, teleport); resolves as a flee
    Abandon,
}

/// Something that happened during a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatEffect {
    PlayerHit { damage: i32, monster_health: i32 },
    MonsterHit { damage: i32, character_health: i32 },
    FleeFailed,
    Fled,
    Victory,
    Defeat,
}

/// Dice and odds used by `step`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatRules {
    pub player_die: i32,
    pub monster_die: i32,
    pub flee_chance: f64,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            player_die: 6,
            monster_die: 4,
            flee_chance: 0.5,
        }
    }
}

/// Result of a successful step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: CombatSession,
    pub player_health: i32,
    pub monster_health: i32,
    pub effects: Vec<CombatEffect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CombatError {
    #[error("It is not your turn!")]
    NotYourTurn,

    #[error("Wait for your opening!")]
    NotMonsterTurn,

    #[error("That fight is already over.")]
    Finished,
}

/// Damage of one blow: attack + roll - defense, at least 1
pub fn blow_damage(attack: i32, roll: i32, defense: i32) -> i32 {
    (attack + roll - defense).max(1)
}

/// Apply damage to health, returns (new_health, is_dead)
pub fn apply_damage(current_health: i32, damage: i32) -> (i32, bool) {
    let new_health = (current_health - damage).max(0);
    (new_health, new_health <= 0)
}

/// Advance a combat session by one action
pub fn step<R: Rng + ?Sized>(
    session: &CombatSession,
    action: CombatAction,
    player: &Combatant,
    monster: &Combatant,
    rules: &CombatRules,
    tick: u64,
    rng: &mut R,
) -> Result<Transition, CombatError> {
    if session.status.is_terminal() {
        return Err(CombatError::Finished);
    }

    let mut next = session.clone();
    let mut player_health = player.health;
    let mut monster_health = monster.health;
    let mut effects = Vec::new();

    match action {
        CombatAction::PlayerAttack => {
            if session.turn != Turn::Player {
                return Err(CombatError::NotYourTurn);
            }
            let roll = rng.gen_range(1..=rules.player_die.max(1));
            let damage = blow_damage(player.attack, roll, monster.defense);
            let (health, dead) = apply_damage(monster_health, damage);
            monster_health = health;
            next.player_blows += 1;
            effects.push(CombatEffect::PlayerHit {
                damage,
                monster_health,
            });
            if dead {
                next.status = CombatStatus::PlayerVictory;
                effects.push(CombatEffect::Victory);
            } else {
                next.turn = Turn::Monster;
            }
        }
        CombatAction::PlayerFlee => {
            if session.turn != Turn::Player {
                return Err(CombatError::NotYourTurn);
            }
            next.player_blows += 1;
            if rng.gen_bool(rules.flee_chance.clamp(0.0, 1.0)) {
                next.status = CombatStatus::Fled;
                effects.push(CombatEffect::Fled);
            } else {
                next.turn = Turn::Monster;
                effects.push(CombatEffect::FleeFailed);
            }
        }
        CombatAction::MonsterAttack => {
            if session.turn != Turn::Monster {
                return Err(CombatError::NotMonsterTurn);
            }
            let roll = rng.gen_range(1..=rules.monster_die.max(1));
            let damage = blow_damage(monster.attack, roll, player.defense);
            let (health, dead) = apply_damage(player_health, damage);
            player_health = health;
            next.monster_blows += 1;
            effects.push(CombatEffect::MonsterHit {
                damage,
                character_health: player_health,
            });
            if dead {
                next.status = CombatStatus::PlayerDefeat;
                effects.push(CombatEffect::Defeat);
            } else {
                next.turn = Turn::Player;
            }
        }
        CombatAction::Abandon => {
            next.status = CombatStatus::Fled;
            effects.push(CombatEffect::Fled);
            return Ok(Transition {
                session: next,
                player_health,
                monster_health,
                effects,
            });
        }
    }

    next.turns += 1;
    next.turn_started_tick = tick;
    Ok(Transition {
        session: next,
        player_health,
        monster_health,
        effects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn session() -> CombatSession {
        CombatSession::new(Uuid::new_v4(), MonsterId(1), 3, 0)
    }

    fn hero() -> Combatant {
        Combatant {
            health: 20,
            attack: 10,
            defense: 2,
        }
    }

    fn goblin() -> Combatant {
        Combatant {
            health: 10,
            attack: 5,
            defense: 0,
        }
    }

    #[test]
    fn damage_is_floored_at_one() {
        assert_eq!(blow_damage(1, 1, 50), 1);
        assert_eq!(blow_damage(10, 3, 2), 11);
        assert_eq!(apply_damage(5, 9), (0, true));
        assert_eq!(apply_damage(5, 2), (3, false));
    }

    #[test]
    fn player_blow_hands_turn_to_monster() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let tougher = Combatant {
            health: 100,
            ..goblin()
        };
        let t = step(&session(), CombatAction::PlayerAttack, &hero(), &tougher, &CombatRules::default(), 1, &mut rng)
            .unwrap();
        assert_eq!(t.session.turn, Turn::Monster);
        assert_eq!(t.session.player_blows, 1);
        assert_eq!(t.session.turns, 1);
        assert_eq!(t.session.turn_started_tick, 1);
        assert!(t.monster_health >= 100 - 16 && t.monster_health <= 100 - 11);
    }

    #[test]
    fn lethal_blow_is_victory() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let t = step(&session(), CombatAction::PlayerAttack, &hero(), &goblin(), &CombatRules::default(), 1, &mut rng)
            .unwrap();
        assert_eq!(t.monster_health, 0);
        assert_eq!(t.session.status, CombatStatus::PlayerVictory);
        assert_eq!(t.effects.last(), Some(&CombatEffect::Victory));
    }

    #[test]
    fn acting_out_of_turn_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let rules = CombatRules::default();
        let s = session();
        assert_eq!(
            step(&s, CombatAction::MonsterAttack, &hero(), &goblin(), &rules, 1, &mut rng),
            Err(CombatError::NotMonsterTurn)
        );

        let ambush = CombatSession::ambush(s.character, s.monster, s.room, 0);
        assert_eq!(
            step(&ambush, CombatAction::PlayerFlee, &hero(), &goblin(), &rules, 1, &mut rng),
            Err(CombatError::NotYourTurn)
        );
        assert_eq!(
            step(&ambush, CombatAction::PlayerAttack, &hero(), &goblin(), &rules, 1, &mut rng),
            Err(CombatError::NotYourTurn)
        );
    }

    #[test]
    fn terminal_sessions_refuse_actions() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut s = session();
        s.status = CombatStatus::Fled;
        assert_eq!(
            step(&s, CombatAction::PlayerAttack, &hero(), &goblin(), &CombatRules::default(), 1, &mut rng),
            Err(CombatError::Finished)
        );
    }

    #[test]
    fn flee_odds_are_respected() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let always = CombatRules {
            flee_chance: 1.0,
            ..CombatRules::default()
        };
        let never = CombatRules {
            flee_chance: 0.0,
            ..CombatRules::default()
        };

        let t = step(&session(), CombatAction::PlayerFlee, &hero(), &goblin(), &always, 1, &mut rng).unwrap();
        assert_eq!(t.session.status, CombatStatus::Fled);

        let t = step(&session(), CombatAction::PlayerFlee, &hero(), &goblin(), &never, 1, &mut rng).unwrap();
        assert_eq!(t.session.status, CombatStatus::Active);
        assert_eq!(t.session.turn, Turn::Monster);
        assert_eq!(t.effects, vec![CombatEffect::FleeFailed]);
    }

    #[test]
    fn monster_can_kill_and_health_stays_non_negative() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let s = CombatSession::ambush(Uuid::new_v4(), MonsterId(1), 3, 0);
        let frail = Combatant {
            health: 1,
            attack: 1,
            defense: 0,
        };
        let t = step(&s, CombatAction::MonsterAttack, &frail, &goblin(), &CombatRules::default(), 1, &mut rng)
            .unwrap();
        assert_eq!(t.player_health, 0);
        assert_eq!(t.session.status, CombatStatus::PlayerDefeat);
    }

    #[test]
    fn abandon_ends_in_flight_on_any_turn() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let s = CombatSession::ambush(Uuid::new_v4(), MonsterId(1), 3, 0);
        let t = step(&s, CombatAction::Abandon, &hero(), &goblin(), &CombatRules::default(), 5, &mut rng).unwrap();
        assert_eq!(t.session.status, CombatStatus::Fled);
        assert_eq!(t.player_health, 20);
    }

    #[test]
    fn full_fight_alternates_and_terminates_in_bound() {
        // 20/20 character with the weakest possible swing against a
        // 10 hp, attack 5, defense 0 monster.
        let rules = CombatRules::default();
        let player_min = blow_damage(1, 1, 0);
        let monster_min = blow_damage(5, 1, 0);
        let bound = (10 + player_min - 1) / player_min + (20 + monster_min - 1) / monster_min;

        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut s = session();
            let mut player = Combatant {
                health: 20,
                attack: 1,
                defense: 0,
            };
            let mut monster = goblin();
            let mut last_turn = None;

            while !s.status.is_terminal() {
                assert_ne!(Some(s.turn), last_turn, "turns must alternate");
                last_turn = Some(s.turn);
                let action = match s.turn {
                    Turn::Player => CombatAction::PlayerAttack,
                    Turn::Monster => CombatAction::MonsterAttack,
                };
                let t = step(&s, action, &player, &monster, &rules, s.turns as u64, &mut rng).unwrap();
                player.health = t.player_health;
                monster.health = t.monster_health;
                s = t.session;

                assert!(player.health >= 0);
                assert!(s.player_blows.abs_diff(s.monster_blows) <= 1);
            }
            assert!(s.turns as i32 <= bound);
        }
    }
}
