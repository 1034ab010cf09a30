//! Login, registration and character creation
//!
//! Account and character lookups go through the persistence worker; the
//! session parks in a waiting phase until the matching notice arrives.

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::Engine;
use crate::auth::{generate_salt, hash_password, verify_password, AuthError};
use crate::game::character::{Attributes, Character, Class, Race};
use crate::game::world::ItemKind;
use crate::game::CharacterId;
use crate::session::{AuthPhase, SessionId};
use crate::store::records::{AccountRecord, CharacterRecord, ADMIN_ACCESS_LEVEL, PLAYER_ACCESS_LEVEL};
use crate::store::PersistRequest;
use crate::util::sanitize::{clean_line, validate_character_name, validate_username, MAX_LINE_LEN};

fn race_menu() -> String {
    let mut lines = vec!["Choose your race:".to_string()];
    lines.extend(
        Race::ALL
            .iter()
            .map(|race| format!("  {:<9} - {}", race.name(), race.description())),
    );
    lines.join("\n")
}

fn class_menu() -> String {
    let mut lines = vec!["Choose your class:".to_string()];
    lines.extend(
        Class::ALL
            .iter()
            .map(|class| format!("  {:<8} - {}", class.name(), class.description())),
    );
    lines.join("\n")
}

impl Engine {
    fn set_phase(&mut self, session_id: SessionId, phase: AuthPhase) {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.phase = phase;
        }
    }

    fn restart_login(&mut self, session_id: SessionId) {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.phase = AuthPhase::AwaitingUsername;
            session.account = None;
        }
        self.send(session_id, "Username:");
    }

    /// Input from a session that has not entered the world yet
    pub(super) fn handle_login_line(&mut self, session_id: SessionId, raw: &str) {
        let Some(phase) = self.sessions.get(session_id).map(|s| s.phase.clone()) else {
            return;
        };
        let input = clean_line(raw, MAX_LINE_LEN);

        match phase {
            AuthPhase::AwaitingUsername => {
                if input.eq_ignore_ascii_case("register") || input.eq_ignore_ascii_case("new") {
                    self.set_phase(session_id, AuthPhase::RegisterUsername);
                    self.send(session_id, "Choose a username:");
                    return;
                }
                if input.is_empty() {
                    self.send(session_id, "Username:");
                    return;
                }
                match validate_username(&input) {
                    Ok(username) => {
                        self.set_phase(session_id, AuthPhase::AwaitingPassword { username });
                        self.send(session_id, "Password:");
                    }
                    Err(msg) => {
                        self.send(session_id, msg);
                        self.send(session_id, "Username:");
                    }
                }
            }
            AuthPhase::AwaitingPassword { username } => {
                if input.is_empty() {
                    self.send(session_id, "Password:");
                    return;
                }
                self.set_phase(
                    session_id,
                    AuthPhase::Verifying {
                        username: username.clone(),
                        password: input,
                    },
                );
                self.request(PersistRequest::LoadAccount {
                    session_id,
                    username,
                });
            }
            AuthPhase::Verifying { .. } | AuthPhase::Loading => {
                self.send(session_id, "Please wait...");
            }
            AuthPhase::RegisterUsername => match validate_username(&input) {
                Ok(username) => {
                    self.set_phase(session_id, AuthPhase::RegisterPassword { username });
                    self.send(session_id, "Choose a password:");
                }
                Err(msg) => {
                    self.send(session_id, msg);
                    self.send(session_id, "Choose a username:");
                }
            },
            AuthPhase::RegisterPassword { username } => {
                let salt = generate_salt(&mut self.rng);
                match hash_password(&input, &salt) {
                    Ok(password_hash) => {
                        let record = AccountRecord {
                            username,
                            password_hash,
                            salt,
                            access_level: PLAYER_ACCESS_LEVEL,
                            character_id: None,
                            created_at: Utc::now(),
                        };
                        self.set_phase(session_id, AuthPhase::Loading);
                        self.request(PersistRequest::CreateAccount { session_id, record });
                    }
                    Err(err) => {
                        self.send(session_id, err.to_string());
                        self.send(session_id, "Choose a password:");
                    }
                }
            }
            AuthPhase::CreateName => match validate_character_name(&input) {
                Ok(name) => {
                    self.set_phase(session_id, AuthPhase::CreateRace { name });
                    self.send(session_id, race_menu());
                }
                Err(msg) => {
                    self.send(session_id, msg);
                    self.send(session_id, "Enter a name for your character:");
                }
            },
            AuthPhase::CreateRace { name } => match input.parse::<Race>() {
                Ok(race) => {
                    self.set_phase(session_id, AuthPhase::CreateClass { name, race });
                    self.send(session_id, class_menu());
                }
                Err(msg) => {
                    self.send(session_id, msg);
                    self.send(session_id, race_menu());
                }
            },
            AuthPhase::CreateClass { name, race } => match input.parse::<Class>() {
                Ok(class) => self.finish_creation(session_id, name, race, class),
                Err(msg) => {
                    self.send(session_id, msg);
                    self.send(session_id, class_menu());
                }
            },
            AuthPhase::Playing => {
                debug!(session_id = %session_id, "Playing session without a character");
            }
        }
    }

    pub(super) fn on_account_loaded(
        &mut self,
        session_id: SessionId,
        username: &str,
        account: Option<AccountRecord>,
    ) {
        let Some(session) = self.sessions.get(session_id) else {
            return;
        };
        let password = match &session.phase {
            AuthPhase::Verifying {
                username: pending,
                password,
            } if pending == username => password.clone(),
            _ => {
                debug!(session_id = %session_id, "Stale account notice ignored");
                return;
            }
        };

        let verified = match account {
            Some(account) => match verify_password(&password, &account.salt, &account.password_hash) {
                Ok(()) => Some(account),
                Err(AuthError::CorruptRecord) => {
                    error!(username, "Stored credentials are corrupt");
                    None
                }
                Err(_) => None,
            },
            None => None,
        };
        let Some(account) = verified else {
            warn!(session_id = %session_id, username, "Failed login");
            self.send(session_id, AuthError::InvalidCredentials.to_string());
            self.restart_login(session_id);
            return;
        };

        if self.sessions.logged_in_as(&account.username, session_id).is_some() {
            warn!(session_id = %session_id, username, "Account already in use");
            self.send(session_id, "That account is already logged in.");
            self.restart_login(session_id);
            return;
        }

        info!(session_id = %session_id, username, level = account.access_level, "Login succeeded");
        let character_id = account.character_id;
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.account = Some(account);
        }
        match character_id {
            Some(character_id) => {
                self.set_phase(session_id, AuthPhase::Loading);
                self.send(session_id, "Loading your character...");
                self.request(PersistRequest::LoadCharacter {
                    session_id,
                    character_id,
                });
            }
            None => self.begin_creation(session_id),
        }
    }

    pub(super) fn on_account_created(&mut self, session_id: SessionId, account: Option<AccountRecord>) {
        if !matches!(self.sessions.get(session_id).map(|s| &s.phase), Some(AuthPhase::Loading)) {
            return;
        }
        let Some(account) = account else {
            self.send(session_id, "That username is already taken.");
            self.set_phase(session_id, AuthPhase::RegisterUsername);
            self.send(session_id, "Choose a username:");
            return;
        };

        info!(session_id = %session_id, username = %account.username, level = account.access_level, "Account registered");
        self.send(session_id, format!("Account '{}' created.", account.username));
        if account.access_level >= ADMIN_ACCESS_LEVEL {
            self.send(
                session_id,
                "You are the first adventurer here and have been granted administrator access.",
            );
        }
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.account = Some(account);
        }
        self.begin_creation(session_id);
    }

    pub(super) fn on_character_loaded(
        &mut self,
        session_id: SessionId,
        character_id: CharacterId,
        character: Option<Character>,
    ) {
        if !matches!(self.sessions.get(session_id).map(|s| &s.phase), Some(AuthPhase::Loading)) {
            return;
        }
        match character {
            Some(character) => self.enter_world(session_id, character),
            None => {
                warn!(session_id = %session_id, character = %character_id, "Linked character missing");
                self.send(session_id, "Your character could not be found. Let's create a new one.");
                self.begin_creation(session_id);
            }
        }
    }

    pub(super) fn on_persist_failed(&mut self, session_id: Option<SessionId>, operation: &str, error: &str) {
        error!(session_id = ?session_id, operation, error, "Persistence failed");
        let Some(session_id) = session_id else {
            return;
        };
        let waiting = self
            .sessions
            .get(session_id)
            .is_some_and(|s| !s.is_playing());
        if waiting {
            self.send(
                session_id,
                "The server could not complete your request. Please try again.",
            );
            self.restart_login(session_id);
        }
    }

    fn begin_creation(&mut self, session_id: SessionId) {
        self.set_phase(session_id, AuthPhase::CreateName);
        self.send(session_id, "Let's create your character.");
        self.send(session_id, "Enter a name for your character:");
    }

    fn finish_creation(&mut self, session_id: SessionId, name: String, race: Race, class: Class) {
        let Some(username) = self
            .sessions
            .get(session_id)
            .and_then(|s| s.username().map(str::to_string))
        else {
            self.restart_login(session_id);
            return;
        };

        let rolled = Attributes::roll(&mut self.rng);
        let mut character = Character::create(
            Uuid::new_v4(),
            username.clone(),
            name,
            race,
            class,
            rolled,
            self.rules.start_room,
        );
        for key in class.starting_items() {
            let Some(template) = self.world.item_template(key) else {
                warn!(item = key, "Starting item has no template");
                continue;
            };
            match template.kind {
                ItemKind::Weapon { .. } if character.equipment.weapon.is_none() => {
                    character.equipment.weapon = Some(key.to_string());
                }
                ItemKind::Armor { .. } if character.equipment.armor.is_none() => {
                    character.equipment.armor = Some(key.to_string());
                }
                _ => {}
            }
            character.inventory.push(key.to_string());
        }

        let id = character.id;
        info!(session_id = %session_id, username = %username, character = %character.name, %race, %class, "Character created");
        self.request(PersistRequest::SaveCharacter(Box::new(
            CharacterRecord::snapshot(&character),
        )));
        self.request(PersistRequest::LinkCharacter {
            username,
            character_id: id,
        });
        if let Some(account) = self
            .sessions
            .get_mut(session_id)
            .and_then(|s| s.account.as_mut())
        {
            account.character_id = Some(id);
        }

        self.send(
            session_id,
            format!(
                "You are {}, a {} {}. Health {}, Mana {}.",
                character.name, race, class, character.max_health, character.max_mana
            ),
        );
        self.enter_world(session_id, character);
    }
}
