//! Per-character status line templates

use std::fmt::Write;

use super::character::Character;

pub const DEFAULT_STATUS_TEMPLATE: &str =
    "HP: {health}/{max_health} | MP: {mana}/{max_mana} | Room: {room_name}";

/// Longest template a character may set
pub const MAX_TEMPLATE_LEN: usize = 120;

/// Every placeholder a template may reference
pub const PLACEHOLDERS: &[&str] = &[
    "name",
    "level",
    "race",
    "class",
    "health",
    "max_health",
    "mana",
    "max_mana",
    "experience",
    "strength",
    "dexterity",
    "constitution",
    "intelligence",
    "wisdom",
    "charisma",
    "room_name",
    "room_id",
    "exits",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Status line templates may be at most {} characters.", MAX_TEMPLATE_LEN)]
    TooLong,

    #[error("Status line template cannot be empty.")]
    Empty,

    #[error("Unknown placeholder {{{0}}}. Type 'statusline help' for the list.")]
    UnknownPlaceholder(String),

    #[error("Unbalanced braces in status line template.")]
    Unbalanced,
}

/// Check length, brace balance and placeholder names
pub fn validate(template: &str) -> Result<(), TemplateError> {
    if template.trim().is_empty() {
        return Err(TemplateError::Empty);
    }
    if template.chars().count() > MAX_TEMPLATE_LEN {
        return Err(TemplateError::TooLong);
    }

    let mut rest = template;
    loop {
        let open = rest.find('{');
        let close = rest.find('}');
        match (open, close) {
            (None, None) => return Ok(()),
            (Some(open), Some(close)) if open < close => {
                let name = &rest[open + 1..close];
                if name.contains('{') {
                    return Err(TemplateError::Unbalanced);
                }
                if !PLACEHOLDERS.contains(&name) {
                    return Err(TemplateError::UnknownPlaceholder(name.to_string()));
                }
                rest = &rest[close + 1..];
            }
            _ => return Err(TemplateError::Unbalanced),
        }
    }
}

/// Live values the placeholders are filled from
pub struct StatusContext<'a> {
    pub character: &'a Character,
    pub room_name: &'a str,
    pub exits: &'a str,
}

impl StatusContext<'_> {
    fn value(&self, placeholder: &str) -> Option<String> {
        let c = self.character;
        let a = &c.attributes;
        Some(match placeholder {
            "name" => c.name.clone(),
            "level" => c.level.to_string(),
            "race" => c.race.to_string(),
            "class" => c.class.to_string(),
            "health" => c.health.to_string(),
            "max_health" => c.max_health.to_string(),
            "mana" => c.mana.to_string(),
            "max_mana" => c.max_mana.to_string(),
            "experience" => c.experience.to_string(),
            "strength" => a.strength.to_string(),
            "dexterity" => a.dexterity.to_string(),
            "constitution" => a.constitution.to_string(),
            "intelligence" => a.intelligence.to_string(),
            "wisdom" => a.wisdom.to_string(),
            "charisma" => a.charisma.to_string(),
            "room_name" => self.room_name.to_string(),
            "room_id" => c.room.to_string(),
            "exits" => self.exits.to_string(),
            _ => return None,
        })
    }
}

/// Fill a template; unknown placeholders are left as written
pub fn render(template: &str, ctx: &StatusContext<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match ctx.value(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        let _ = write!(out, "{{{}}}", name);
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Wrap a rendered status line as the input prompt
pub fn prompt(rendered: &str) -> String {
    format!("[{}] > ", rendered)
}

/// Help text listing every placeholder
pub fn help_text() -> String {
    let names: Vec<String> = PLACEHOLDERS.iter().map(|p| format!("{{{}}}", p)).collect();
    format!(
        "Status line commands:\n  statusline show         - show your current template\n  statusline set <format> - change it\n  statusline reset        - restore the default\nPlaceholders: {}\nDefault: {}",
        names.join(" "),
        DEFAULT_STATUS_TEMPLATE
    )
}
