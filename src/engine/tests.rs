//! Engine scenarios driven through lines, notices and explicit ticks

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;

use super::*;
use crate::auth::{generate_salt, hash_password, verify_password};
use crate::game::character::{Class, Race};
use crate::game::combat::Turn;
use crate::game::testing::{sample_character, sample_world};
use crate::net::{ConnectionHandle, Outbound};
use crate::session::AuthPhase;
use crate::store::records::{AccountRecord, ADMIN_ACCESS_LEVEL, PLAYER_ACCESS_LEVEL};
use crate::util::shutdown::shutdown_channel;
use crate::util::time::SystemClock;

/// Default rules with the slow background cycles pushed out of the way
fn quiet_rules() -> GameRules {
    GameRules {
        wander_every: 1000,
        repop_every: 1000,
        autosave_every: 1000,
        ..GameRules::default()
    }
}

struct Harness {
    engine: Engine,
    persist: mpsc::UnboundedReceiver<PersistRequest>,
}

impl Harness {
    fn new() -> Self {
        Self::with_rules(quiet_rules())
    }

    fn with_rules(rules: GameRules) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Engine::new(sample_world(), rules, tx, shared_stats(), 7).unwrap();
        Self {
            engine,
            persist: rx,
        }
    }

    fn connect(&mut self, id: u64) -> mpsc::Receiver<Outbound> {
        let (handle, rx) = ConnectionHandle::channel(64);
        self.engine.handle_net_event(NetEvent::Connected {
            session_id: SessionId(id),
            peer: "127.0.0.1:40000".parse().unwrap(),
            handle,
        });
        rx
    }

    /// Connect, bind `character` and swallow the welcome frame
    fn join(&mut self, id: u64, character: Character) -> (CharacterId, mpsc::Receiver<Outbound>) {
        let mut rx = self.connect(id);
        let character_id = character.id;
        self.engine.enter_world(SessionId(id), character);
        self.tick();
        drain(&mut rx);
        (character_id, rx)
    }

    fn make_admin(&mut self, id: u64) {
        let session = self.engine.sessions.get_mut(SessionId(id)).unwrap();
        session.account = Some(account("admin", ADMIN_ACCESS_LEVEL, session.character));
    }

    fn line(&mut self, id: u64, line: &str) {
        self.engine.handle_line(SessionId(id), line);
    }

    fn tick(&mut self) -> TickReport {
        self.engine.tick(Instant::now())
    }

    fn requests(&mut self) -> Vec<PersistRequest> {
        let mut out = Vec::new();
        while let Ok(request) = self.persist.try_recv() {
            out.push(request);
        }
        out
    }

    fn character(&self, id: CharacterId) -> &Character {
        self.engine.world.character(id).unwrap()
    }
}

fn account(username: &str, access_level: u8, character_id: Option<CharacterId>) -> AccountRecord {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let salt = generate_salt(&mut rng);
    AccountRecord {
        username: username.to_string(),
        password_hash: hash_password("hunter22", &salt).unwrap(),
        salt,
        access_level,
        character_id,
        created_at: Utc::now(),
    }
}

/// A character too weak to finish a goblin in one blow
fn weakling(name: &str, room: RoomId) -> Character {
    let mut character = sample_character(name, room);
    character.attributes.strength = 1;
    character
}

fn outbound(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Outbound> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

fn drain(rx: &mut mpsc::Receiver<Outbound>) -> String {
    outbound(rx)
        .into_iter()
        .filter_map(|message| match message {
            Outbound::Frame(text) => Some(text),
            Outbound::Close => None,
        })
        .collect()
}

// ----------------------------------------------------------------------
// Output coordination
// ----------------------------------------------------------------------

#[test]
fn two_looks_in_one_tick_share_one_status_line() {
    let mut h = Harness::new();
    let (id, mut rx) = h.join(1, sample_character("Hero", 1));

    h.line(1, "look");
    h.line(1, "l");
    assert!(drain(&mut rx).is_empty(), "nothing is written before the flush");

    h.tick();
    let frame = drain(&mut rx);
    let description = h.engine.describe_room(id);
    assert_eq!(frame.matches(description.as_str()).count(), 2);
    assert_eq!(frame.matches("] > ").count(), 1);
    assert!(frame.ends_with("Room: Town Square] > "));
    assert!(h.engine.sessions.get(SessionId(1)).unwrap().buffer.is_empty());
}

#[test]
fn idle_ticks_stay_silent() {
    let mut h = Harness::new();
    let (_, mut rx) = h.join(1, sample_character("Hero", 1));
    for _ in 0..3 {
        h.tick();
    }
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn heartbeat_policy_prompts_every_tick() {
    let mut h = Harness::with_rules(GameRules {
        heartbeat: crate::session::HeartbeatPolicy::EveryTick,
        ..quiet_rules()
    });
    let (_, mut rx) = h.join(1, sample_character("Hero", 1));
    h.tick();
    h.tick();
    assert_eq!(drain(&mut rx).matches("] > ").count(), 2);
}

#[test]
fn room_broadcasts_reach_bystanders_once() {
    let mut h = Harness::new();
    let (_, mut aria) = h.join(1, sample_character("Aria", 1));
    let (_, mut bram) = h.join(2, sample_character("Bram", 1));
    drain(&mut aria);

    h.line(1, "say hello there");
    h.line(1, "'and again");
    h.tick();

    let spoken = drain(&mut aria);
    assert!(spoken.contains("You say: hello there"));
    assert_eq!(spoken.matches("] > ").count(), 1);

    let heard = drain(&mut bram);
    assert!(heard.contains("Aria says: hello there\nAria says: and again\n"));
    assert_eq!(heard.matches("] > ").count(), 1);
}

// ----------------------------------------------------------------------
// Movement
// ----------------------------------------------------------------------

#[test]
fn missing_exit_leaves_character_in_place() {
    let mut h = Harness::new();
    let (id, mut rx) = h.join(1, sample_character("Hero", 1));

    h.line(1, "east");
    h.tick();
    let frame = drain(&mut rx);
    assert!(frame.contains("There is no exit east from here."));
    assert!(frame.ends_with("Room: Town Square] > "));
    assert_eq!(h.character(id).room, 1);
}

#[test]
fn movement_is_seen_by_both_rooms_and_rate_limited_by_cooldown() {
    let mut h = Harness::new();
    let (id, mut hero) = h.join(1, sample_character("Hero", 1));
    let (_, mut scout) = h.join(2, sample_character("Scout", 3));
    drain(&mut hero);

    h.line(1, "s");
    h.line(1, "north");
    h.tick();
    assert_eq!(h.character(id).room, 3);
    let frame = drain(&mut hero);
    assert!(frame.contains("Forest Path"));
    assert!(frame.contains("You must wait before you can move again."));
    assert!(drain(&mut scout).contains("Hero arrives."));

    h.line(1, "north");
    assert_eq!(h.character(id).room, 1);
    h.tick();
    assert!(drain(&mut scout).contains("Hero leaves north."));
}

// ----------------------------------------------------------------------
// Combat
// ----------------------------------------------------------------------

#[test]
fn attack_in_safe_zone_is_rejected_without_state_change() {
    let mut h = Harness::new();
    let (id, mut rx) = h.join(1, sample_character("Hero", 1));
    let goblin = h.engine.world.spawn_monster("goblin", 1, None).unwrap();

    h.line(1, "attack goblin");
    h.tick();
    assert!(drain(&mut rx).contains("You cannot attack in this sacred place!"));
    assert!(h.engine.world.combat(id).is_none());
    let monster = h.engine.world.monster(goblin).unwrap();
    assert!(monster.engaged_with.is_none());
    assert_eq!(monster.health, 10);
}

#[test]
fn strong_opening_blow_wins_and_drops_loot() {
    let mut h = Harness::new();
    let (id, mut rx) = h.join(1, sample_character("Hero", 3));

    h.line(1, "kill goblin");
    assert!(h.engine.world.combat(id).is_none());
    assert!(h.engine.world.monsters_in_room(3).is_empty());
    assert_eq!(h.character(id).experience, 15);
    assert_eq!(h.engine.world.visible_items(3), vec!["Health Potion"]);

    h.tick();
    let frame = drain(&mut rx);
    assert!(frame.contains("You have slain the Goblin! You gain 15 experience."));
    assert!(h
        .requests()
        .iter()
        .any(|r| matches!(r, PersistRequest::SaveCharacter(record) if record.character.id == id)));
}

#[test]
fn turns_alternate_until_one_side_falls() {
    let mut h = Harness::with_rules(GameRules {
        auto_attack_delay: 0,
        ..quiet_rules()
    });
    let mut fighter = weakling("Hero", 3);
    fighter.max_health = 20;
    fighter.health = 20;
    let (id, _rx) = h.join(1, fighter);

    h.line(1, "attack goblin");
    let mut turns = 0;
    for _ in 0..200 {
        let Some(session) = h.engine.world.combat(id) else {
            break;
        };
        assert!(session.player_blows.abs_diff(session.monster_blows) <= 1);
        turns = session.turns;
        h.tick();
        assert!(h.character(id).health >= 0);
    }

    assert!(h.engine.world.combat(id).is_none());
    // minimum player blow is 2, minimum monster blow is 1
    let bound = (10 + 1) / 2 + 20;
    assert!(turns <= bound, "{} turns exceeds {}", turns, bound);
    let won = h.engine.world.monsters_in_room(3).is_empty();
    assert!(won || h.character(id).room == 2);
}

#[test]
fn defeat_respawns_in_the_temple() {
    let mut h = Harness::new();
    let mut doomed = weakling("Hero", 3);
    doomed.set_health(1);
    let max_health = doomed.max_health;
    let (id, mut rx) = h.join(1, doomed);
    let goblin = h.engine.world.monsters_in_room(3)[0];

    h.line(1, "attack goblin");
    assert!(h.engine.world.combat(id).is_some());
    h.tick();

    let hero = h.character(id);
    assert_eq!(hero.room, 2);
    assert_eq!(hero.health, max_health / 2);
    assert!(h.engine.world.combat(id).is_none());
    assert!(h.engine.world.monster(goblin).unwrap().engaged_with.is_none());

    let frame = drain(&mut rx);
    assert!(frame.contains("You have died!"));
    assert!(frame.ends_with("Room: Temple of Healing] > "));
}

#[test]
fn engine_refuses_unsafe_respawn_or_missing_start_room() {
    let build = |rules: GameRules| {
        let (tx, _rx) = mpsc::unbounded_channel();
        Engine::new(sample_world(), rules, tx, shared_stats(), 7).err()
    };

    assert_eq!(
        build(GameRules {
            respawn_room: 3,
            ..quiet_rules()
        }),
        Some(EngineError::UnsafeRespawnRoom(3))
    );
    assert_eq!(
        build(GameRules {
            respawn_room: 99,
            ..quiet_rules()
        }),
        Some(EngineError::UnsafeRespawnRoom(99))
    );
    assert_eq!(
        build(GameRules {
            start_room: 99,
            ..quiet_rules()
        }),
        Some(EngineError::MissingStartRoom(99))
    );
    assert!(build(quiet_rules()).is_none());
}

#[test]
fn flee_out_of_turn_is_a_combat_state_error() {
    let mut h = Harness::new();
    let (id, mut rx) = h.join(1, weakling("Hero", 3));

    h.line(1, "flee");
    h.line(1, "attack goblin");
    h.line(1, "flee");
    h.tick();

    let frame = drain(&mut rx);
    assert!(frame.contains("You are not fighting anything."));
    assert!(frame.contains("It is not your turn!"));
    assert!(h.engine.world.combat(id).is_some());
}

#[test]
fn successful_flee_leaves_through_an_exit() {
    let mut h = Harness::with_rules(GameRules {
        flee_chance: 1.0,
        ..quiet_rules()
    });
    let (id, mut rx) = h.join(1, weakling("Hero", 3));
    let goblin = h.engine.world.monsters_in_room(3)[0];

    h.line(1, "attack goblin");
    h.tick();
    h.line(1, "flee");

    assert!(h.engine.world.combat(id).is_none());
    assert_ne!(h.character(id).room, 3);
    assert!(h.engine.world.monster(goblin).unwrap().engaged_with.is_none());
    h.tick();
    assert!(drain(&mut rx).contains("You flee from the Goblin!"));
}

#[test]
fn walking_out_of_a_fight_flees_through_that_exit() {
    let mut h = Harness::with_rules(GameRules {
        flee_chance: 1.0,
        ..quiet_rules()
    });
    let (id, mut rx) = h.join(1, weakling("Hero", 3));
    let (_, mut watcher) = h.join(2, sample_character("Watcher", 5));
    let goblin = h.engine.world.monsters_in_room(3)[0];

    h.line(1, "attack goblin");
    h.tick();
    h.line(1, "east");

    assert!(h.engine.world.combat(id).is_none());
    assert_eq!(h.character(id).room, 5);
    assert!(h.engine.world.monster(goblin).unwrap().engaged_with.is_none());
    h.tick();
    let frame = drain(&mut rx);
    assert!(frame.contains("You flee from the Goblin!"));
    assert!(frame.ends_with("Room: Clearing] > "));
    assert!(drain(&mut watcher).contains("Hero arrives, out of breath."));
}

#[test]
fn failed_escape_on_the_move_keeps_the_fight_going() {
    let mut h = Harness::with_rules(GameRules {
        flee_chance: 0.0,
        ..quiet_rules()
    });
    let (id, mut rx) = h.join(1, weakling("Hero", 3));

    h.line(1, "attack goblin");
    h.tick();
    h.line(1, "west");
    let session = h.engine.world.combat(id).cloned().unwrap();
    assert_eq!(session.turn, Turn::Player);

    h.line(1, "east");
    assert_eq!(h.character(id).room, 3);
    assert_eq!(h.engine.world.combat(id).unwrap().turn, Turn::Monster);
    h.tick();

    let frame = drain(&mut rx);
    assert!(frame.contains("There is no exit west from here."));
    assert!(frame.contains("You try to flee, but the Goblin blocks your way!"));
    assert!(!frame.contains("You cannot leave"));
}

#[test]
fn second_attacker_is_turned_away() {
    let mut h = Harness::new();
    let (aria, _a) = h.join(1, weakling("Aria", 3));
    let (bram, mut b) = h.join(2, weakling("Bram", 3));

    h.line(1, "attack goblin");
    h.line(2, "attack goblin");
    h.tick();

    assert!(h.engine.world.combat(aria).is_some());
    assert!(h.engine.world.combat(bram).is_none());
    assert!(drain(&mut b).contains("The Goblin is already fighting Aria."));
}

#[test]
fn disconnect_mid_fight_resolves_at_the_tick_boundary() {
    let mut h = Harness::new();
    let (id, _rx) = h.join(1, weakling("Hero", 3));
    let (_, mut watcher) = h.join(2, sample_character("Watcher", 3));
    let goblin = h.engine.world.monsters_in_room(3)[0];

    h.line(1, "attack goblin");
    h.requests();
    h.engine.handle_net_event(NetEvent::Disconnected {
        session_id: SessionId(1),
    });
    // still bound until the boundary
    assert!(h.engine.world.combat(id).is_some());

    let report = h.tick();
    assert_eq!(report.removed, 1);
    assert!(h.engine.world.combat(id).is_none());
    assert!(h.engine.world.character(id).is_none());
    assert!(h.engine.world.monster(goblin).unwrap().engaged_with.is_none());
    assert!(h
        .requests()
        .iter()
        .any(|r| matches!(r, PersistRequest::SaveCharacter(record) if record.character.id == id)));
    assert!(drain(&mut watcher).contains("Hero has fled from the Goblin!"));
}

#[test]
fn aggressive_monster_ambushes_and_strikes_first() {
    let mut h = Harness::new();
    let (id, mut rx) = h.join(1, sample_character("Hero", 3));
    let max_health = h.character(id).max_health;

    h.line(1, "south");
    h.tick();

    let session = h.engine.world.combat(id).unwrap();
    assert_eq!(session.monster_blows, 1);
    assert!(h.character(id).health < max_health);
    assert!(drain(&mut rx).contains("The Grey Wolf attacks you!"));
}

// ----------------------------------------------------------------------
// Items, resting, status line
// ----------------------------------------------------------------------

#[test]
fn items_move_between_room_inventory_and_equipment() {
    let mut h = Harness::new();
    let (id, mut rx) = h.join(1, sample_character("Hero", 5));
    h.engine.world.spawn_item(5, "iron_sword", false).unwrap();

    h.line(1, "get potion");
    h.line(1, "take sword");
    h.line(1, "wield sword");
    assert_eq!(h.character(id).equipment.weapon.as_deref(), Some("iron_sword"));

    h.engine.world.character_mut(id).unwrap().set_health(50);
    h.line(1, "drink potion");
    assert_eq!(h.character(id).health, 75);
    assert_eq!(h.character(id).inventory, vec!["iron_sword".to_string()]);

    h.line(1, "drop sword");
    assert!(h.character(id).equipment.weapon.is_none());
    assert!(h.character(id).inventory.is_empty());
    assert_eq!(h.engine.world.visible_items(5), vec!["Iron Sword"]);

    h.tick();
    let frame = drain(&mut rx);
    assert!(frame.contains("You recover 25 health."));
    assert!(frame.contains("You drop the Iron Sword."));
}

#[test]
fn search_eventually_reveals_hidden_items() {
    let mut h = Harness::new();
    let mut sage = sample_character("Sage", 5);
    sage.attributes.intelligence = 40;
    let (_, mut rx) = h.join(1, sage);

    let mut found = false;
    for _ in 0..20 {
        h.line(1, "search");
        if h.engine.world.visible_items(5).contains(&"Silver Ring") {
            found = true;
            break;
        }
        for _ in 0..4 {
            h.tick();
        }
    }
    assert!(found);
    h.tick();
    assert!(drain(&mut rx).contains("You found: Silver Ring!"));
}

#[test]
fn resting_regenerates_until_full() {
    let mut h = Harness::with_rules(GameRules {
        regen_every: 1,
        ..quiet_rules()
    });
    let (id, mut rx) = h.join(1, sample_character("Hero", 1));
    h.engine.world.character_mut(id).unwrap().set_health(50);

    h.line(1, "rest");
    h.tick();
    let regen = (h.character(id).max_health / 10).max(1);
    assert_eq!(h.character(id).health, 50 + regen);

    for _ in 0..20 {
        if !h.character(id).resting {
            break;
        }
        h.tick();
    }
    assert_eq!(h.character(id).health, h.character(id).max_health);
    assert!(!h.character(id).resting);
    assert!(drain(&mut rx).contains("You feel fully rested."));
}

#[test]
fn custom_status_line_drives_the_prompt() {
    let mut h = Harness::new();
    let (id, mut rx) = h.join(1, sample_character("Hero", 1));

    h.line(1, "statusline set {name} L{level}");
    h.tick();
    assert!(drain(&mut rx).ends_with("[Hero L1] > "));

    h.line(1, "statusline set {bogus}");
    h.tick();
    assert!(drain(&mut rx).ends_with("[Hero L1] > "));
    assert_eq!(h.character(id).status_template, "{name} L{level}");

    h.line(1, "statusline reset");
    h.tick();
    assert!(drain(&mut rx).ends_with("Room: Town Square] > "));
}

#[test]
fn bad_input_fails_locally() {
    let mut h = Harness::new();
    let (_, mut rx) = h.join(1, sample_character("Hero", 1));

    h.line(1, "dance wildly");
    h.line(1, "get");
    h.tick();
    let frame = drain(&mut rx);
    assert!(frame.contains("Unknown command: 'dance'"));
    assert!(frame.contains("Get what?"));
    assert_eq!(frame.matches("] > ").count(), 1);
}

#[test]
fn quit_saves_and_closes_after_the_final_frame() {
    let mut h = Harness::new();
    let (id, mut rx) = h.join(1, sample_character("Hero", 1));

    h.line(1, "quit");
    h.tick();
    let messages = outbound(&mut rx);
    assert!(matches!(messages.first(), Some(Outbound::Frame(text)) if text.contains("Goodbye!")));
    assert_eq!(messages.last(), Some(&Outbound::Close));

    let report = h.tick();
    assert_eq!(report.removed, 1);
    assert!(h.engine.world.character(id).is_none());
    assert!(h
        .requests()
        .iter()
        .any(|r| matches!(r, PersistRequest::SaveCharacter(record) if record.character.id == id)));
}

#[test]
fn unwritable_session_is_dropped_without_stalling() {
    let mut h = Harness::new();
    let (id, rx) = h.join(1, sample_character("Hero", 1));
    let (_, mut other) = h.join(2, sample_character("Other", 1));
    drop(rx);

    h.line(1, "look");
    h.line(2, "look");
    h.tick();
    assert!(h.engine.sessions.get(SessionId(1)).unwrap().dead);
    assert!(drain(&mut other).contains("Town Square"));

    assert_eq!(h.tick().removed, 1);
    assert!(h.engine.world.character(id).is_none());
}

// ----------------------------------------------------------------------
// Login and registration
// ----------------------------------------------------------------------

#[test]
fn registration_creates_an_admin_character() {
    let mut h = Harness::new();
    let mut rx = h.connect(1);
    h.tick();
    assert!(drain(&mut rx).contains("Username:"));

    h.line(1, "register");
    h.line(1, "newbie");
    h.line(1, "abc");
    h.line(1, "secret1");
    let record = match h.requests().pop() {
        Some(PersistRequest::CreateAccount { session_id, record }) => {
            assert_eq!(session_id, SessionId(1));
            record
        }
        other => panic!("unexpected request {:?}", other),
    };
    assert_eq!(record.username, "newbie");
    assert_eq!(record.access_level, PLAYER_ACCESS_LEVEL);
    assert!(verify_password("secret1", &record.salt, &record.password_hash).is_ok());

    // the worker promotes the first account
    let promoted = AccountRecord {
        access_level: ADMIN_ACCESS_LEVEL,
        ..record
    };
    h.engine.handle_notice(PersistNotice::AccountCreated {
        session_id: SessionId(1),
        account: Some(promoted),
    });
    h.line(1, "aria");
    h.line(1, "gnome");
    h.line(1, "elf");
    h.line(1, "mage");

    let session = h.engine.sessions.get(SessionId(1)).unwrap();
    assert!(session.is_playing());
    assert_eq!(session.access_level(), ADMIN_ACCESS_LEVEL);
    let id = session.character.unwrap();
    let aria = h.character(id);
    assert_eq!(aria.name, "Aria");
    assert_eq!((aria.race, aria.class), (Race::Elf, Class::Mage));
    assert_eq!(aria.room, 1);
    // staff and robe are not in this world's item list
    assert_eq!(aria.inventory, vec!["mana_potion".to_string()]);

    let requests = h.requests();
    assert!(requests
        .iter()
        .any(|r| matches!(r, PersistRequest::SaveCharacter(record) if record.character.id == id)));
    assert!(requests.iter().any(|r| matches!(
        r,
        PersistRequest::LinkCharacter { username, character_id } if username == "newbie" && *character_id == id
    )));

    h.tick();
    let frame = drain(&mut rx);
    assert!(frame.contains("Passwords must be at least 6 characters."));
    assert!(frame.contains("'gnome' is not a race."));
    assert!(frame.contains("administrator access"));
    assert!(frame.contains("Welcome, Aria!"));
    assert!(frame.ends_with("Room: Town Square] > "));
}

#[test]
fn taken_username_returns_to_registration() {
    let mut h = Harness::new();
    let mut rx = h.connect(1);
    h.line(1, "register");
    h.line(1, "hero");
    h.line(1, "secret1");
    h.engine.handle_notice(PersistNotice::AccountCreated {
        session_id: SessionId(1),
        account: None,
    });

    assert_eq!(
        h.engine.sessions.get(SessionId(1)).unwrap().phase,
        AuthPhase::RegisterUsername
    );
    h.tick();
    assert!(drain(&mut rx).contains("That username is already taken."));
}

#[test]
fn login_loads_the_linked_character() {
    let mut h = Harness::new();
    let hero = sample_character("Hero", 3);
    let stored = account("hero", PLAYER_ACCESS_LEVEL, Some(hero.id));
    let _rx = h.connect(1);

    h.line(1, "Hero");
    h.line(1, "hunter22");
    assert!(matches!(
        h.requests().as_slice(),
        [PersistRequest::LoadAccount { username, .. }] if username == "hero"
    ));

    h.engine.handle_notice(PersistNotice::AccountLoaded {
        session_id: SessionId(1),
        username: "hero".to_string(),
        account: Some(stored),
    });
    assert!(matches!(
        h.requests().as_slice(),
        [PersistRequest::LoadCharacter { character_id, .. }] if *character_id == hero.id
    ));

    h.engine.handle_notice(PersistNotice::CharacterLoaded {
        session_id: SessionId(1),
        character_id: hero.id,
        record: Some(Box::new(CharacterRecord::snapshot(&hero))),
    });
    assert!(h.engine.sessions.get(SessionId(1)).unwrap().is_playing());
    assert_eq!(h.character(hero.id).room, 3);
}

#[test]
fn wrong_password_restarts_login() {
    let mut h = Harness::new();
    let mut rx = h.connect(1);
    h.line(1, "hero");
    h.line(1, "letmein");
    h.engine.handle_notice(PersistNotice::AccountLoaded {
        session_id: SessionId(1),
        username: "hero".to_string(),
        account: Some(account("hero", PLAYER_ACCESS_LEVEL, None)),
    });

    let session = h.engine.sessions.get(SessionId(1)).unwrap();
    assert_eq!(session.phase, AuthPhase::AwaitingUsername);
    assert!(session.account.is_none());
    h.tick();
    assert!(drain(&mut rx).contains("Invalid username or password."));
}

#[test]
fn account_cannot_log_in_twice() {
    let mut h = Harness::new();
    let (_, _first) = h.join(1, sample_character("Hero", 1));
    h.engine.sessions.get_mut(SessionId(1)).unwrap().account =
        Some(account("hero", PLAYER_ACCESS_LEVEL, None));

    let mut rx = h.connect(2);
    h.line(2, "hero");
    h.line(2, "hunter22");
    h.engine.handle_notice(PersistNotice::AccountLoaded {
        session_id: SessionId(2),
        username: "hero".to_string(),
        account: Some(account("hero", PLAYER_ACCESS_LEVEL, None)),
    });
    assert!(!h.engine.sessions.get(SessionId(2)).unwrap().is_playing());
    h.tick();
    assert!(drain(&mut rx).contains("That account is already logged in."));
}

#[test]
fn idle_logins_time_out() {
    let mut h = Harness::with_rules(GameRules {
        login_timeout_ticks: 3,
        ..quiet_rules()
    });
    let mut rx = h.connect(1);

    h.tick();
    h.tick();
    assert!(!h.engine.sessions.get(SessionId(1)).unwrap().closing);
    h.tick();
    let messages = outbound(&mut rx);
    assert_eq!(messages.last(), Some(&Outbound::Close));
    assert_eq!(h.tick().removed, 1);
    assert!(h.engine.sessions.is_empty());
}

#[test]
fn full_server_refuses_new_connections() {
    let mut h = Harness::with_rules(GameRules {
        max_players: 1,
        ..quiet_rules()
    });
    let _first = h.connect(1);
    let mut second = h.connect(2);
    assert_eq!(h.engine.sessions.len(), 1);
    let messages = outbound(&mut second);
    assert!(matches!(messages.first(), Some(Outbound::Frame(text)) if text.contains("full")));
    assert_eq!(messages.last(), Some(&Outbound::Close));
}

// ----------------------------------------------------------------------
// Admin
// ----------------------------------------------------------------------

#[test]
fn admin_commands_need_access() {
    let mut h = Harness::new();
    let (_, mut rx) = h.join(1, sample_character("Hero", 1));
    h.line(1, "/server_stats");
    h.tick();
    assert!(drain(&mut rx).contains("You do not have permission to do that."));
}

#[test]
fn temporary_spawn_fades_when_its_time_is_up() {
    let mut h = Harness::new();
    let (_, mut rx) = h.join(1, sample_character("Hero", 5));
    h.make_admin(1);

    h.line(1, "/spawn_monster goblin 2");
    assert_eq!(h.engine.world.monsters_in_room(5).len(), 1);
    h.tick();
    assert_eq!(h.engine.world.monsters_in_room(5).len(), 1);
    h.tick();
    assert!(h.engine.world.monsters_in_room(5).is_empty());
    assert!(drain(&mut rx).contains("The Goblin fades away."));
}

#[test]
fn huge_spawn_lifetime_never_expires_early() {
    let mut h = Harness::new();
    let (_, _rx) = h.join(1, sample_character("Hero", 5));
    h.make_admin(1);

    h.line(1, &format!("/spawn_monster goblin {}", u64::MAX));
    let spawned = h.engine.world.monsters_in_room(5);
    assert_eq!(spawned.len(), 1);
    assert_eq!(
        h.engine.world.monster(spawned[0]).unwrap().expires_at,
        Some(u64::MAX)
    );
    h.tick();
    h.tick();
    assert_eq!(h.engine.world.monsters_in_room(5).len(), 1);
}

#[test]
fn admin_can_teleport_and_kick() {
    let mut h = Harness::new();
    let (_, _admin) = h.join(1, sample_character("Warden", 1));
    let (bram, mut rx) = h.join(2, sample_character("Bram", 3));
    h.make_admin(1);

    h.line(1, "/teleport bram 2");
    assert_eq!(h.character(bram).room, 2);
    h.line(1, "/kick Bram");
    h.tick();

    let messages = outbound(&mut rx);
    assert!(matches!(messages.first(), Some(Outbound::Frame(text))
        if text.contains("Temple of Healing") && text.contains("You have been kicked")));
    assert_eq!(messages.last(), Some(&Outbound::Close));
}

#[test]
fn kicked_fighter_leaves_no_combat_behind() {
    let mut h = Harness::new();
    let (_, _admin) = h.join(1, sample_character("Warden", 1));
    let (bram, mut rx) = h.join(2, weakling("Bram", 3));
    let goblin = h.engine.world.monsters_in_room(3)[0];
    h.make_admin(1);

    h.line(2, "attack goblin");
    h.line(1, "/kick Bram");
    h.tick();
    assert_eq!(outbound(&mut rx).last(), Some(&Outbound::Close));

    let report = h.tick();
    assert_eq!(report.removed, 1);
    assert!(h.engine.world.character(bram).is_none());
    assert!(h.engine.world.combat(bram).is_none());
    assert_eq!(h.engine.world.combat_count(), 0);
    assert!(h.engine.world.monster(goblin).unwrap().engaged_with.is_none());
}

#[test]
fn broadcast_reaches_every_player() {
    let mut h = Harness::new();
    let (_, _admin) = h.join(1, sample_character("Warden", 1));
    let (_, mut far) = h.join(2, sample_character("Far", 5));
    h.make_admin(1);

    h.line(1, "/broadcast \"Server restart soon\"");
    h.tick();
    assert!(drain(&mut far).contains("[Broadcast] Server restart soon"));
}

// ----------------------------------------------------------------------
// Loop, stats and shutdown
// ----------------------------------------------------------------------

#[test]
fn stats_are_published_each_tick() {
    let mut h = Harness::new();
    let _ = h.join(1, sample_character("Hero", 1));
    h.tick();
    let stats = h.engine.stats.read().clone();
    assert_eq!(stats.tick, h.engine.current_tick());
    assert_eq!(stats.players, 1);
    assert_eq!(stats.rooms, 5);
    assert_eq!(stats.monsters, 2);
}

#[test]
fn shutdown_saves_and_closes_everyone() {
    let mut h = Harness::new();
    let (_, mut rx) = h.join(1, sample_character("Hero", 1));
    h.engine.shutdown();

    let messages = outbound(&mut rx);
    assert!(matches!(messages.first(), Some(Outbound::Frame(text)) if text.contains("shutting down")));
    assert_eq!(messages.last(), Some(&Outbound::Close));
    let requests = h.requests();
    assert!(requests.iter().any(|r| matches!(r, PersistRequest::SaveWorld(_))));
    assert!(requests.iter().any(|r| matches!(r, PersistRequest::SaveCharacter(_))));
}

#[tokio::test]
async fn run_loop_ticks_until_shutdown() {
    let rules = GameRules {
        tick_period: Duration::from_millis(10),
        ..quiet_rules()
    };
    let (persist_tx, mut persist_rx) = mpsc::unbounded_channel();
    let engine = Engine::new(sample_world(), rules, persist_tx, shared_stats(), 1).unwrap();
    let stats = engine.stats.clone();
    let (net_tx, net_rx) = mpsc::unbounded_channel();
    let (_notice_tx, notice_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let task = tokio::spawn(engine.run(net_rx, notice_rx, Arc::new(SystemClock), shutdown_rx));

    let (handle, mut out) = ConnectionHandle::channel(16);
    net_tx
        .send(NetEvent::Connected {
            session_id: SessionId(1),
            peer: "127.0.0.1:40001".parse().unwrap(),
            handle,
        })
        .unwrap();
    let first = tokio::time::timeout(Duration::from_secs(2), out.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, Outbound::Frame(ref text) if text.contains("Username:")));

    shutdown_tx.trigger();
    task.await.unwrap();
    assert!(stats.read().tick >= 1);
    assert!(outbound(&mut out).contains(&Outbound::Close));

    let mut saved_world = false;
    while let Ok(request) = persist_rx.try_recv() {
        saved_world |= matches!(request, PersistRequest::SaveWorld(_));
    }
    assert!(saved_world);
}
