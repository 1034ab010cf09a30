//! Command vocabulary: the finite `Action` set, the verb/synonym table and
//! the parser turning an input line into an `Action`.

use std::collections::HashMap;

use super::combat::CombatError;
use super::status::TemplateError;
use super::world::Direction;
use super::RoomId;
use crate::util::sanitize::clean_speech;

/// Player-facing command failures; `Display` is the text sent back
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Malformed command, bad argument or insufficient access
    #[error("{0}")]
    Validation(String),

    /// Forbidden here: safe zones, missing exits
    #[error("{0}")]
    Zone(String),

    /// Acting out of turn or on a finished fight
    #[error("{0}")]
    CombatState(String),
}

impl CommandError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CommandError::Validation(msg.into())
    }

    pub fn zone(msg: impl Into<String>) -> Self {
        CommandError::Zone(msg.into())
    }

    pub fn combat_state(msg: impl Into<String>) -> Self {
        CommandError::CombatState(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::Validation(_) => "validation",
            CommandError::Zone(_) => "zone",
            CommandError::CombatState(_) => "combat_state",
        }
    }
}

impl From<CombatError> for CommandError {
    fn from(err: CombatError) -> Self {
        CommandError::CombatState(err.to_string())
    }
}

impl From<TemplateError> for CommandError {
    fn from(err: TemplateError) -> Self {
        CommandError::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLineCommand {
    Show,
    Set(String),
    Reset,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Help,
    Teleport { player: String, room: RoomId },
    Goto(RoomId),
    SpawnMonster { template: String, ticks: Option<u64> },
    SpawnItem(String),
    Broadcast(String),
    ServerStats,
    Kick(String),
    ListRooms,
    ListMonsters,
    SaveWorld,
    /// Heal a named player, or yourself
    Heal(Option<String>),
}

/// A fully parsed player command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Look,
    Move(Direction),
    Attack(String),
    Flee,
    Say(String),
    Rest,
    Stand,
    Stats,
    Inventory,
    Get(String),
    Drop(String),
    Equip(String),
    Unequip(String),
    Use(String),
    Search,
    Who,
    Help(Option<String>),
    StatusLine(StatusLineCommand),
    Quit,
    Admin(AdminCommand),
}

impl Action {
    /// Actions a resting character can take without standing up
    pub fn keeps_resting(&self) -> bool {
        matches!(
            self,
            Action::Look
                | Action::Rest
                | Action::Say(_)
                | Action::Stats
                | Action::Inventory
                | Action::Who
                | Action::Help(_)
                | Action::StatusLine(_)
                | Action::Admin(_)
        )
    }
}

/// Player verbs; every one must have at least one word in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Look,
    Move,
    North,
    South,
    East,
    West,
    Up,
    Down,
    Attack,
    Flee,
    Say,
    Rest,
    Stand,
    Stats,
    Inventory,
    Get,
    Drop,
    Equip,
    Unequip,
    Use,
    Search,
    Who,
    Help,
    StatusLine,
    Quit,
}

impl Verb {
    pub const ALL: [Verb; 25] = [
        Verb::Look,
        Verb::Move,
        Verb::North,
        Verb::South,
        Verb::East,
        Verb::West,
        Verb::Up,
        Verb::Down,
        Verb::Attack,
        Verb::Flee,
        Verb::Say,
        Verb::Rest,
        Verb::Stand,
        Verb::Stats,
        Verb::Inventory,
        Verb::Get,
        Verb::Drop,
        Verb::Equip,
        Verb::Unequip,
        Verb::Use,
        Verb::Search,
        Verb::Who,
        Verb::Help,
        Verb::StatusLine,
        Verb::Quit,
    ];

    fn usage(self) -> &'static str {
        match self {
            Verb::Look => "look - describe your surroundings",
            Verb::Move => "move <direction> - walk through an exit",
            Verb::North | Verb::South | Verb::East | Verb::West | Verb::Up | Verb::Down => {
                "north/south/east/west/up/down - walk in that direction"
            }
            Verb::Attack => "attack <monster> - start a fight",
            Verb::Flee => "flee - try to escape a fight on your turn",
            Verb::Say => "say <message> - speak to the room (shorthand: 'message)",
            Verb::Rest => "rest - recover health and mana over time",
            Verb::Stand => "stand - stop resting",
            Verb::Stats => "stats - show your character sheet",
            Verb::Inventory => "inventory - list what you carry",
            Verb::Get => "get <item> - pick up an item",
            Verb::Drop => "drop <item> - drop an item",
            Verb::Equip => "equip <item> - wield a weapon or wear armor",
            Verb::Unequip => "unequip <weapon|armor|item> - take off equipment",
            Verb::Use => "use <item> - drink a potion",
            Verb::Search => "search - look for hidden things",
            Verb::Who => "who - list players online",
            Verb::Help => "help [command] - show help",
            Verb::StatusLine => "statusline [show|set <format>|reset|help] - customise your prompt",
            Verb::Quit => "quit - save and leave the world",
        }
    }
}

const VERB_WORDS: &[(&str, Verb)] = &[
    ("look", Verb::Look),
    ("l", Verb::Look),
    ("move", Verb::Move),
    ("go", Verb::Move),
    ("north", Verb::North),
    ("n", Verb::North),
    ("south", Verb::South),
    ("s", Verb::South),
    ("east", Verb::East),
    ("e", Verb::East),
    ("west", Verb::West),
    ("w", Verb::West),
    ("up", Verb::Up),
    ("u", Verb::Up),
    ("down", Verb::Down),
    ("d", Verb::Down),
    ("attack", Verb::Attack),
    ("kill", Verb::Attack),
    ("fight", Verb::Attack),
    ("a", Verb::Attack),
    ("flee", Verb::Flee),
    ("say", Verb::Say),
    ("speak", Verb::Say),
    ("rest", Verb::Rest),
    ("sleep", Verb::Rest),
    ("stand", Verb::Stand),
    ("wake", Verb::Stand),
    ("stats", Verb::Stats),
    ("status", Verb::Stats),
    ("score", Verb::Stats),
    ("inventory", Verb::Inventory),
    ("inv", Verb::Inventory),
    ("i", Verb::Inventory),
    ("get", Verb::Get),
    ("take", Verb::Get),
    ("drop", Verb::Drop),
    ("equip", Verb::Equip),
    ("wield", Verb::Equip),
    ("wear", Verb::Equip),
    ("unequip", Verb::Unequip),
    ("remove", Verb::Unequip),
    ("use", Verb::Use),
    ("drink", Verb::Use),
    ("eat", Verb::Use),
    ("search", Verb::Search),
    ("find", Verb::Search),
    ("who", Verb::Who),
    ("help", Verb::Help),
    ("?", Verb::Help),
    ("statusline", Verb::StatusLine),
    ("quit", Verb::Quit),
    ("exit", Verb::Quit),
];

/// Admin verbs, reached with the `/` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminVerb {
    Help,
    Teleport,
    Goto,
    SpawnMonster,
    SpawnItem,
    Broadcast,
    ServerStats,
    Kick,
    ListRooms,
    ListMonsters,
    SaveWorld,
    Heal,
}

impl AdminVerb {
    pub const ALL: [AdminVerb; 12] = [
        AdminVerb::Help,
        AdminVerb::Teleport,
        AdminVerb::Goto,
        AdminVerb::SpawnMonster,
        AdminVerb::SpawnItem,
        AdminVerb::Broadcast,
        AdminVerb::ServerStats,
        AdminVerb::Kick,
        AdminVerb::ListRooms,
        AdminVerb::ListMonsters,
        AdminVerb::SaveWorld,
        AdminVerb::Heal,
    ];

    pub fn usage(self) -> &'static str {
        match self {
            AdminVerb::Help => "/admin_help - this list",
            AdminVerb::Teleport => "/teleport <player> <room_id> - move a player",
            AdminVerb::Goto => "/goto <room_id> - move yourself",
            AdminVerb::SpawnMonster => "/spawn_monster <template> [ticks] - spawn a monster here",
            AdminVerb::SpawnItem => "/spawn_item <template> - create an item here",
            AdminVerb::Broadcast => "/broadcast <message> - message every player",
            AdminVerb::ServerStats => "/server_stats - engine statistics",
            AdminVerb::Kick => "/kick <player> - disconnect a player",
            AdminVerb::ListRooms => "/list_rooms - every room",
            AdminVerb::ListMonsters => "/list_monsters - monster templates and live monsters",
            AdminVerb::SaveWorld => "/save_world - persist the world now",
            AdminVerb::Heal => "/heal [player] - restore health and mana",
        }
    }
}

const ADMIN_WORDS: &[(&str, AdminVerb)] = &[
    ("admin_help", AdminVerb::Help),
    ("help", AdminVerb::Help),
    ("teleport", AdminVerb::Teleport),
    ("tp", AdminVerb::Teleport),
    ("goto", AdminVerb::Goto),
    ("spawn_monster", AdminVerb::SpawnMonster),
    ("spawn_item", AdminVerb::SpawnItem),
    ("broadcast", AdminVerb::Broadcast),
    ("server_stats", AdminVerb::ServerStats),
    ("kick", AdminVerb::Kick),
    ("list_rooms", AdminVerb::ListRooms),
    ("list_monsters", AdminVerb::ListMonsters),
    ("save_world", AdminVerb::SaveWorld),
    ("heal", AdminVerb::Heal),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("command word '{0}' is bound twice")]
    DuplicateWord(&'static str),

    #[error("verb {0} has no command word")]
    MissingVerb(String),
}

/// Verb lookup tables, checked for completeness when built
#[derive(Debug, Clone)]
pub struct CommandTable {
    verbs: HashMap<&'static str, Verb>,
    admin: HashMap<&'static str, AdminVerb>,
}

impl CommandTable {
    pub fn build() -> Result<Self, TableError> {
        Self::from_words(VERB_WORDS, ADMIN_WORDS)
    }

    fn from_words(
        verb_words: &[(&'static str, Verb)],
        admin_words: &[(&'static str, AdminVerb)],
    ) -> Result<Self, TableError> {
        let mut verbs = HashMap::new();
        for (word, verb) in verb_words {
            if verbs.insert(*word, *verb).is_some() {
                return Err(TableError::DuplicateWord(*word));
            }
        }
        if let Some(missing) = Verb::ALL.iter().find(|v| !verbs.values().any(|b| b == *v)) {
            return Err(TableError::MissingVerb(format!("{:?}", missing)));
        }

        let mut admin = HashMap::new();
        for (word, verb) in admin_words {
            if admin.insert(*word, *verb).is_some() {
                return Err(TableError::DuplicateWord(*word));
            }
        }
        if let Some(missing) = AdminVerb::ALL
            .iter()
            .find(|v| !admin.values().any(|b| b == *v))
        {
            return Err(TableError::MissingVerb(format!("{:?}", missing)));
        }

        Ok(Self { verbs, admin })
    }

    /// Words bound to a verb, in table order
    fn words_for(&self, verb: Verb) -> Vec<&'static str> {
        VERB_WORDS
            .iter()
            .filter(|(word, v)| *v == verb && self.verbs.contains_key(word))
            .map(|(word, _)| *word)
            .collect()
    }

    /// Parse one sanitised input line
    pub fn parse(&self, line: &str) -> Result<Action, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::validation("What?"));
        }
        if let Some(speech) = line.strip_prefix('\'') {
            return speak(speech);
        }
        if let Some(admin) = line.strip_prefix('/') {
            return self.parse_admin(admin).map(Action::Admin);
        }

        let (word, rest) = split_word(line);
        let lower = word.to_ascii_lowercase();
        let verb = self.verbs.get(lower.as_str()).copied().ok_or_else(|| {
            CommandError::validation(format!(
                "Unknown command: '{}'. Type 'help' for a list of commands.",
                word
            ))
        })?;

        let need = |what: &str| -> Result<String, CommandError> {
            if rest.is_empty() {
                Err(CommandError::validation(format!("{} what?", what)))
            } else {
                Ok(rest.to_string())
            }
        };

        Ok(match verb {
            Verb::Look => Action::Look,
            Verb::Move => Action::Move(Direction::parse(rest).ok_or_else(|| {
                CommandError::validation("Go where? Try north, south, east, west, up or down.")
            })?),
            Verb::North => Action::Move(Direction::North),
            Verb::South => Action::Move(Direction::South),
            Verb::East => Action::Move(Direction::East),
            Verb::West => Action::Move(Direction::West),
            Verb::Up => Action::Move(Direction::Up),
            Verb::Down => Action::Move(Direction::Down),
            Verb::Attack => Action::Attack(need("Attack")?),
            Verb::Flee => Action::Flee,
            Verb::Say => return speak(rest),
            Verb::Rest => Action::Rest,
            Verb::Stand => Action::Stand,
            Verb::Stats => Action::Stats,
            Verb::Inventory => Action::Inventory,
            Verb::Get => Action::Get(need("Get")?),
            Verb::Drop => Action::Drop(need("Drop")?),
            Verb::Equip => Action::Equip(need("Equip")?),
            Verb::Unequip => Action::Unequip(need("Unequip")?),
            Verb::Use => Action::Use(need("Use")?),
            Verb::Search => Action::Search,
            Verb::Who => Action::Who,
            Verb::Help => Action::Help((!rest.is_empty()).then(|| rest.to_ascii_lowercase())),
            Verb::StatusLine => Action::StatusLine(parse_statusline(rest)?),
            Verb::Quit => Action::Quit,
        })
    }

    fn parse_admin(&self, line: &str) -> Result<AdminCommand, CommandError> {
        let args = split_quoted(line)?;
        let Some((word, args)) = args.split_first() else {
            return Err(CommandError::validation(
                "Admin command expected. Type /admin_help for a list.",
            ));
        };
        let verb = self
            .admin
            .get(word.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| {
                CommandError::validation(format!(
                    "Unknown admin command: /{}. Type /admin_help for a list.",
                    word
                ))
            })?;

        let usage = || CommandError::validation(format!("Usage: {}", verb.usage()));
        let room_arg = |arg: &String| arg.parse::<RoomId>().map_err(|_| usage());

        Ok(match (verb, args) {
            (AdminVerb::Help, _) => AdminCommand::Help,
            (AdminVerb::Teleport, [player, room]) => AdminCommand::Teleport {
                player: player.clone(),
                room: room_arg(room)?,
            },
            (AdminVerb::Goto, [room]) => AdminCommand::Goto(room_arg(room)?),
            (AdminVerb::SpawnMonster, [template]) => AdminCommand::SpawnMonster {
                template: template.to_ascii_lowercase(),
                ticks: None,
            },
            (AdminVerb::SpawnMonster, [template, ticks]) => AdminCommand::SpawnMonster {
                template: template.to_ascii_lowercase(),
                ticks: Some(ticks.parse().map_err(|_| usage())?),
            },
            (AdminVerb::SpawnItem, [template]) => {
                AdminCommand::SpawnItem(template.to_ascii_lowercase())
            }
            (AdminVerb::Broadcast, words) if !words.is_empty() => {
                AdminCommand::Broadcast(clean_speech(&words.join(" ")).map_err(CommandError::Validation)?)
            }
            (AdminVerb::ServerStats, []) => AdminCommand::ServerStats,
            (AdminVerb::Kick, [player]) => AdminCommand::Kick(player.clone()),
            (AdminVerb::ListRooms, []) => AdminCommand::ListRooms,
            (AdminVerb::ListMonsters, []) => AdminCommand::ListMonsters,
            (AdminVerb::SaveWorld, []) => AdminCommand::SaveWorld,
            (AdminVerb::Heal, []) => AdminCommand::Heal(None),
            (AdminVerb::Heal, [player]) => AdminCommand::Heal(Some(player.clone())),
            _ => return Err(usage()),
        })
    }

    /// General help, or help for one command word
    pub fn help(&self, topic: Option<&str>) -> Result<String, CommandError> {
        match topic {
            None => {
                let mut lines = vec!["Available commands:".to_string()];
                let mut seen = Vec::new();
                for verb in Verb::ALL {
                    let usage = verb.usage();
                    if seen.contains(&usage) {
                        continue;
                    }
                    seen.push(usage);
                    lines.push(format!("  {}", usage));
                }
                lines.push("Type 'help <command>' for synonyms.".to_string());
                Ok(lines.join("\n"))
            }
            Some(topic) => {
                let verb = self.verbs.get(topic).copied().ok_or_else(|| {
                    CommandError::validation(format!("There is no help on '{}'.", topic))
                })?;
                Ok(format!(
                    "{}\nAlso: {}",
                    verb.usage(),
                    self.words_for(verb).join(", ")
                ))
            }
        }
    }

    pub fn admin_help(&self) -> String {
        let mut lines = vec!["Admin commands:".to_string()];
        lines.extend(AdminVerb::ALL.iter().map(|v| format!("  {}", v.usage())));
        lines.join("\n")
    }
}

fn speak(raw: &str) -> Result<Action, CommandError> {
    clean_speech(raw)
        .map(Action::Say)
        .map_err(CommandError::Validation)
}

fn parse_statusline(rest: &str) -> Result<StatusLineCommand, CommandError> {
    let (sub, format) = split_word(rest);
    match sub.to_ascii_lowercase().as_str() {
        "" | "show" => Ok(StatusLineCommand::Show),
        "set" if !format.is_empty() => Ok(StatusLineCommand::Set(format.to_string())),
        "reset" => Ok(StatusLineCommand::Reset),
        "help" => Ok(StatusLineCommand::Help),
        _ => Err(CommandError::validation(
            "Usage: statusline [show|set <format>|reset|help]",
        )),
    }
}

/// First whitespace-delimited word and the trimmed remainder
fn split_word(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    }
}

/// Split admin arguments on whitespace, honouring single and double quotes
pub fn split_quoted(line: &str) -> Result<Vec<String>, CommandError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_arg = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if quote.is_some() {
        return Err(CommandError::validation("Unterminated quote in command."));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}
