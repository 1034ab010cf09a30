//! Input sanitation for lines, speech and names

/// Longest input line accepted from a client
pub const MAX_LINE_LEN: usize = 512;
/// Longest message accepted by `say` and `/broadcast`
pub const MAX_SPEECH_LEN: usize = 256;

/// Strip control characters, trim, and cap the line at `max_len` characters.
pub fn clean_line(raw: &str, max_len: usize) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .take(max_len)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Validate a chat message.
pub fn clean_speech(raw: &str) -> Result<String, String> {
    let message = clean_line(raw, usize::MAX);
    if message.is_empty() {
        return Err("Say what?".to_string());
    }
    if message.chars().count() > MAX_SPEECH_LEN {
        return Err(format!(
            "That message is too long (max {} characters).",
            MAX_SPEECH_LEN
        ));
    }
    Ok(message)
}

/// Account usernames: 3-16 ASCII letters, digits or underscores, stored lowercase.
pub fn validate_username(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(3..=16).contains(&len) {
        return Err("Usernames must be between 3 and 16 characters.".to_string());
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Usernames may only contain letters, digits and underscores.".to_string());
    }
    Ok(name.to_ascii_lowercase())
}

/// Character names: 3-16 ASCII letters, capitalised.
pub fn validate_character_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(3..=16).contains(&len) {
        return Err("Names must be between 3 and 16 letters.".to_string());
    }
    if !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err("Names may only contain letters.".to_string());
    }

    let lower = name.to_ascii_lowercase();
    let mut chars = lower.chars();
    Ok(match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => lower,
    })
}
