//! Session and draft configuration.
//!
//! Everything deserializes from JSON with every field optional, so a server
//! config file only needs to name what it changes.

use std::time::Duration;

use pickban_protocol::{ChampionId, Phase};
use pickban_timer::TimerConfig;
use serde::{Deserialize, Serialize};

use crate::roster::TeamRoster;
use crate::{DraftError, phase};

// ---------------------------------------------------------------------------
// DraftConfig
// ---------------------------------------------------------------------------

/// Timing and auto-resolution settings for one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    /// Length of every phase. Also the value every resume restarts from.
    pub timer_duration_ms: u64,

    /// Interval between `tick` broadcasts.
    pub tick_interval_ms: u64,

    /// Trailing fraction of a phase reported as the buffer period.
    pub buffer_fraction: f64,

    /// Seconds counted down after both sides are ready to resume.
    pub resume_countdown_secs: u32,

    /// How long an edit proposal waits for the other captain.
    pub edit_ttl_ms: u64,

    /// Advisory pause limit shown to clients. Never enforced.
    pub max_pause_ms: Option<u64>,

    /// Champions an expired pick phase may choose from at random.
    pub auto_pick_pool: Vec<ChampionId>,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            timer_duration_ms: 30_000,
            tick_interval_ms: 1_000,
            buffer_fraction: 1.0 / 6.0,
            resume_countdown_secs: 3,
            edit_ttl_ms: 30_000,
            max_pause_ms: None,
            auto_pick_pool: Vec::new(),
        }
    }
}

impl DraftConfig {
    pub fn timer_duration(&self) -> Duration {
        Duration::from_millis(self.timer_duration_ms)
    }

    pub fn edit_ttl(&self) -> Duration {
        Duration::from_millis(self.edit_ttl_ms)
    }

    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            buffer_fraction: self.buffer_fraction,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionMode / SessionConfig
// ---------------------------------------------------------------------------

/// How sides are filled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// The first two distinct users take blue and red.
    #[default]
    OneVsOne,
    /// Sides and captains come from a fixed roster.
    Team(TeamRoster),
}

/// Everything needed to create one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: SessionMode,

    /// Turn order. Defaults to the 20-phase tournament table.
    pub phases: Vec<Phase>,

    pub draft: DraftConfig,

    /// Bounded mailbox size of the session actor.
    pub mailbox_capacity: usize,

    /// A session with no connections retires after this long.
    pub idle_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::OneVsOne,
            phases: phase::tournament_phases(),
            draft: DraftConfig::default(),
            mailbox_capacity: 64,
            idle_timeout_ms: 15 * 60 * 1_000,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Rejects configs a session could not run with.
    pub fn validate(&self) -> Result<(), DraftError> {
        phase::validate(&self.phases)?;
        if self.mailbox_capacity == 0 {
            return Err(DraftError::Malformed(
                "mailbox_capacity must be at least 1".into(),
            ));
        }
        // A zero-length phase expires the moment it starts, so every phase
        // would auto-resolve in one pass.
        if self.draft.timer_duration_ms == 0 {
            return Err(DraftError::Malformed(
                "timer_duration_ms must be at least 1".into(),
            ));
        }
        if self.draft.edit_ttl_ms == 0 {
            return Err(DraftError::Malformed(
                "edit_ttl_ms must be at least 1".into(),
            ));
        }
        if let SessionMode::Team(roster) = &self.mode {
            roster.validate()?;
        }
        Ok(())
    }
}
