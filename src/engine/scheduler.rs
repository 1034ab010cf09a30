//! Tick scheduling and the engine run loop
//!
//! One tick, in order: reap disconnected sessions, expire cooldowns, run
//! monster AI and combat, regenerate, time out idle logins, autosave, then
//! flush every session exactly once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::stats::ServerStats;
use super::{status_prompt, Engine};
use crate::net::NetEvent;
use crate::session::SessionId;
use crate::store::PersistNotice;
use crate::util::shutdown::ShutdownRx;
use crate::util::time::{uptime_secs, Clock, Timer};

/// Fixed-period deadline tracker
///
/// After an overrun the next tick is due immediately; missed periods are
/// dropped rather than replayed.
#[derive(Debug, Clone)]
pub struct TickTimer {
    period: Duration,
    next: Instant,
}

impl TickTimer {
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next: start + period,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.next
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next
    }

    /// Schedule the next deadline once a tick has finished at `now`.
    /// Returns true when the tick overran its slot.
    pub fn advance(&mut self, now: Instant) -> bool {
        let next = self.next + self.period;
        if next <= now {
            self.next = now;
            true
        } else {
            self.next = next;
            false
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Frames written to transports
    pub flushed: usize,
    /// Sessions reaped at the tick boundary
    pub removed: usize,
}

impl Engine {
    /// Advance the world by one tick
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let timer = Timer::new();
        self.tick += 1;

        if let Some(previous) = self.last_tick_at {
            let gap = now.saturating_duration_since(previous);
            if gap > self.rules.tick_period * 2 {
                warn!(tick = self.tick, gap_ms = gap.as_millis() as u64, "Tick started late");
            }
        }
        self.last_tick_at = Some(now);

        let removed = self.reap_sessions();
        self.expire_cooldowns();

        self.expire_monsters();
        self.repopulate();
        self.monster_aggression();
        self.advance_combats();
        self.wander_monsters();

        self.regenerate();
        self.expire_logins();
        self.autosave();

        let flushed = self.flush_all();
        self.last_tick_micros = timer.elapsed_micros();
        self.publish_stats();

        TickReport {
            tick: self.tick,
            flushed,
            removed,
        }
    }

    /// Remove sessions whose transport is gone; their characters leave the
    /// world and any fight resolves as a flee
    fn reap_sessions(&mut self) -> usize {
        let dead: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|s| s.dead)
            .map(|s| s.id)
            .collect();

        for session_id in &dead {
            let Some(session) = self.sessions.remove(*session_id) else {
                continue;
            };
            if let Some(character) = session.character {
                self.leave_world(character);
            }
            info!(
                session_id = %session_id,
                username = session.username().unwrap_or("-"),
                "Session removed"
            );
        }
        dead.len()
    }

    fn expire_cooldowns(&mut self) {
        let tick = self.tick;
        for character in self.world.characters_mut() {
            character.expire_cooldowns(tick);
        }
    }

    fn expire_logins(&mut self) {
        let tick = self.tick;
        let limit = self.rules.login_timeout_ticks;
        for session in self.sessions.iter_mut() {
            if session.is_playing() || session.closing || session.dead {
                continue;
            }
            if tick.saturating_sub(session.last_input_tick) >= limit {
                info!(session_id = %session.id, peer = %session.peer, "Login timed out");
                session.buffer.push("Login timed out. Goodbye.".to_string());
                session.closing = true;
            }
        }
    }

    fn autosave(&mut self) {
        if self.tick % self.rules.autosave_every != 0 {
            return;
        }
        debug!(tick = self.tick, characters = self.world.character_count(), "Autosave");
        self.save_everything();
    }

    /// Flush every live session once; unwritable transports are marked dead
    fn flush_all(&mut self) -> usize {
        let tick = self.tick;
        let output = self.output;
        let world = &self.world;
        let mut flushed = 0;

        for session in self.sessions.iter_mut() {
            if session.dead {
                continue;
            }
            let character = session.character;
            if let Some(frame) = output.flush(session, tick, || status_prompt(world, character)) {
                match session.handle.send_frame(frame) {
                    Ok(()) => flushed += 1,
                    Err(err) => {
                        warn!(session_id = %session.id, error = %err, "Dropping unwritable session");
                        session.dead = true;
                        continue;
                    }
                }
            }
            if session.closing {
                let _ = session.handle.close();
                session.dead = true;
            }
        }
        flushed
    }

    fn publish_stats(&self) {
        *self.stats.write() = ServerStats {
            tick: self.tick,
            uptime_secs: uptime_secs(),
            sessions: self.sessions.len(),
            players: self.sessions.playing_count(),
            rooms: self.world.room_count(),
            monsters: self.world.monster_count(),
            combats: self.world.combat_count(),
            lines_handled: self.lines_handled,
            overruns: self.overruns,
            last_tick_micros: self.last_tick_micros,
        };
    }

    /// Drive the engine until shutdown
    pub async fn run(
        mut self,
        mut net_rx: mpsc::UnboundedReceiver<NetEvent>,
        mut notice_rx: mpsc::UnboundedReceiver<PersistNotice>,
        clock: Arc<dyn Clock>,
        mut shutdown: ShutdownRx,
    ) {
        let mut timer = TickTimer::new(self.rules.tick_period, clock.now());
        info!(
            period_ms = self.rules.tick_period.as_millis() as u64,
            rooms = self.world.room_count(),
            monsters = self.world.monster_count(),
            "Engine started"
        );

        loop {
            let wait = timer.deadline().saturating_duration_since(clock.now());
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(wait) => {
                    let now = clock.now();
                    if !timer.is_due(now) {
                        continue;
                    }
                    self.tick(now);
                    if timer.advance(clock.now()) {
                        self.overruns += 1;
                        warn!(tick = self.tick, last_tick_micros = self.last_tick_micros, "Tick overran its period");
                    }
                }
                Some(event) = net_rx.recv() => self.handle_net_event(event),
                Some(notice) = notice_rx.recv() => self.handle_notice(notice),
            }
        }

        self.shutdown();
    }

    /// Save everyone, say goodbye and close every connection
    pub fn shutdown(&mut self) {
        info!(
            tick = self.tick,
            players = self.sessions.playing_count(),
            "Engine shutting down"
        );
        self.save_everything();
        for session in self.sessions.iter_mut() {
            session
                .buffer
                .push("The server is shutting down. Goodbye!".to_string());
            session.closing = true;
        }
        // a fresh tick number so sessions already flushed this tick still get the goodbye
        self.tick += 1;
        self.flush_all();
    }
}
