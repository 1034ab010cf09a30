//! Buffered output and once-per-tick status line delivery

use super::Session;

/// Whether an idle authenticated session still gets a prompt every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPolicy {
    OnChange,
    EveryTick,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputCoordinator {
    heartbeat: HeartbeatPolicy,
}

impl OutputCoordinator {
    pub fn new(heartbeat: HeartbeatPolicy) -> Self {
        Self { heartbeat }
    }

    /// Append text to a session's pending output
    pub fn enqueue(session: &mut Session, text: impl Into<String>) {
        session.buffer.push(text.into());
    }

    pub fn mark_status_dirty(session: &mut Session) {
        session.needs_status = true;
    }

    /// Drain the buffer into one frame, ending with at most one status line.
    ///
    /// `status` renders the prompt for the bound character and is only
    /// called when a prompt is due. Returns `None` when there is nothing to
    /// send or this tick was already flushed.
    pub fn flush<F>(&self, session: &mut Session, tick: u64, status: F) -> Option<String>
    where
        F: FnOnce() -> Option<String>,
    {
        if session.last_flushed_tick == Some(tick) {
            return None;
        }
        session.last_flushed_tick = Some(tick);

        let changed = !session.buffer.is_empty() || session.needs_status;
        let mut frame = String::new();
        for line in session.buffer.drain(..) {
            frame.push_str(&line);
            if !line.ends_with('\n') {
                frame.push('\n');
            }
        }

        let wants_prompt = changed || self.heartbeat == HeartbeatPolicy::EveryTick;
        if session.is_playing() && wants_prompt {
            if let Some(prompt) = status() {
                frame.push_str(&prompt);
            }
        }
        session.needs_status = false;

        if frame.is_empty() {
            None
        } else {
            Some(frame)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ConnectionHandle;
    use crate::session::{AuthPhase, SessionId};
    use uuid::Uuid;

    fn playing_session() -> Session {
        let (handle, _rx) = ConnectionHandle::channel(8);
        let mut session = Session::new(SessionId(1), "127.0.0.1:4001".parse().unwrap(), handle, 0);
        session.character = Some(Uuid::new_v4());
        session.phase = AuthPhase::Playing;
        session
    }

    fn prompt() -> Option<String> {
        Some("[HP: 10/10] > ".to_string())
    }

    #[test]
    fn one_prompt_after_buffered_lines() {
        let out = OutputCoordinator::new(HeartbeatPolicy::OnChange);
        let mut session = playing_session();
        OutputCoordinator::enqueue(&mut session, "You look around.");
        OutputCoordinator::enqueue(&mut session, "A goblin is here.\n");

        let frame = out.flush(&mut session, 7, prompt).unwrap();
        assert_eq!(frame, "You look around.\nA goblin is here.\n[HP: 10/10] > ");
        assert!(session.buffer.is_empty());
        assert_eq!(frame.matches("] > ").count(), 1);
    }

    #[test]
    fn second_flush_in_same_tick_is_noop() {
        let out = OutputCoordinator::new(HeartbeatPolicy::EveryTick);
        let mut session = playing_session();
        OutputCoordinator::enqueue(&mut session, "hello");
        assert!(out.flush(&mut session, 3, prompt).is_some());

        OutputCoordinator::enqueue(&mut session, "late");
        assert!(out.flush(&mut session, 3, prompt).is_none());
        assert_eq!(session.buffer, vec!["late".to_string()]);
    }

    #[test]
    fn idle_session_is_quiet_unless_heartbeat() {
        let quiet = OutputCoordinator::new(HeartbeatPolicy::OnChange);
        let mut session = playing_session();
        assert!(quiet.flush(&mut session, 1, prompt).is_none());

        let chatty = OutputCoordinator::new(HeartbeatPolicy::EveryTick);
        assert_eq!(chatty.flush(&mut session, 2, prompt).as_deref(), Some("[HP: 10/10] > "));
    }

    #[test]
    fn dirty_status_alone_emits_prompt() {
        let out = OutputCoordinator::new(HeartbeatPolicy::OnChange);
        let mut session = playing_session();
        OutputCoordinator::mark_status_dirty(&mut session);
        assert_eq!(out.flush(&mut session, 4, prompt).as_deref(), Some("[HP: 10/10] > "));
        assert!(!session.needs_status);
        assert!(out.flush(&mut session, 5, prompt).is_none());
    }

    #[test]
    fn unauthenticated_sessions_never_get_prompts() {
        let out = OutputCoordinator::new(HeartbeatPolicy::EveryTick);
        let (handle, _rx) = ConnectionHandle::channel(8);
        let mut session = Session::new(SessionId(2), "127.0.0.1:4002".parse().unwrap(), handle, 0);
        OutputCoordinator::enqueue(&mut session, "Username:");
        assert_eq!(
            out.flush(&mut session, 1, || panic!("no prompt before login")).as_deref(),
            Some("Username:\n")
        );
    }
}
